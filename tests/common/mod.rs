// Shared fixtures: in-memory stores, a scripted HANA connector and a mock
// SAP Service Layer served on an ephemeral port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use field_portal::config::AppConfig;
use field_portal::middleware::error_handling::Result;
use field_portal::models::sales_order::{
    CreateSalesOrderRequest, ListSalesOrdersQuery, SalesOrder, SalesOrderStatus, UpdateSalesOrderRequest,
};
use field_portal::repositories::{SalesOrderStore, SettingsStore};
use field_portal::services::hana::{self, HanaConnector, HanaQuery, HanaRow};

// ============================================================================
// Configuration
// ============================================================================

pub fn config(pairs: &[(&str, &str)]) -> AppConfig {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(move |key| values.get(key).cloned()).expect("test config")
}

/// Config pointing the Service Layer client at a local mock.
pub fn config_for_mock(addr: SocketAddr) -> AppConfig {
    let port = addr.port().to_string();
    config(&[
        ("SAP_B1S_HOST", "127.0.0.1"),
        ("SAP_B1S_PORT", port.as_str()),
        ("SAP_USE_HTTP", "true"),
        ("SAP_USERNAME", "manager"),
        ("SAP_PASSWORD", "1234"),
        ("SAP_TIMEOUT_SECS", "5"),
    ])
}

pub fn row(value: Value) -> HanaRow {
    value.as_object().cloned().expect("row must be an object")
}

// ============================================================================
// HANA
// ============================================================================

/// Answers each statement with the rows of the first rule whose needle
/// occurs in the SQL. Every call is recorded with its schema.
#[derive(Default)]
pub struct MemoryHana {
    rules: Vec<(String, Vec<HanaRow>)>,
    calls: Mutex<Vec<(String, HanaQuery)>>,
}

impl MemoryHana {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, needle: &str, rows: Vec<HanaRow>) -> Self {
        self.rules.push((needle.to_string(), rows));
        self
    }

    pub fn calls(&self) -> Vec<(String, HanaQuery)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HanaConnector for MemoryHana {
    async fn fetch_all(&self, schema: &str, query: &HanaQuery) -> hana::Result<Vec<HanaRow>> {
        self.calls
            .lock()
            .unwrap()
            .push((schema.to_string(), query.clone()));

        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| query.sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettings {
    pub fn with(self, slug: &str, value: Value) -> Self {
        self.set(slug, value);
        self
    }

    /// Change a setting as an operator would while the portal runs.
    pub fn set(&self, slug: &str, value: Value) {
        self.values.lock().unwrap().insert(slug.to_string(), value);
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, slug: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().unwrap().get(slug).cloned())
    }
}

#[derive(Default)]
pub struct MemorySalesOrders {
    orders: Mutex<Vec<SalesOrder>>,
}

impl MemorySalesOrders {
    fn modify<F>(&self, id: Uuid, f: F) -> Option<SalesOrder>
    where
        F: FnOnce(&mut SalesOrder),
    {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.iter_mut().find(|o| o.id == id)?;
        f(order);
        order.updated_at = Utc::now();
        Some(order.clone())
    }
}

#[async_trait]
impl SalesOrderStore for MemorySalesOrders {
    async fn create(&self, company_db: &str, request: &CreateSalesOrderRequest) -> Result<SalesOrder> {
        let doc_date = request.doc_date.unwrap_or_else(|| Utc::now().date_naive());
        let now = Utc::now();
        let order = SalesOrder {
            id: Uuid::new_v4(),
            company_db: company_db.to_string(),
            card_code: request.card_code.trim().to_string(),
            card_name: request.card_name.clone(),
            contact_person_code: request.contact_person_code,
            federal_tax_id: request.federal_tax_id.clone(),
            pay_to_code: request.pay_to_code.clone(),
            address: request.address.clone(),
            secondary_card_code: request.secondary_card_code.clone(),
            secondary_card_name: request.secondary_card_name.clone(),
            doc_date,
            doc_due_date: request.doc_due_date.unwrap_or(doc_date),
            tax_date: request.tax_date,
            comments: request.comments.clone(),
            status: SalesOrderStatus::Draft,
            is_posted_to_sap: false,
            sap_doc_entry: None,
            sap_doc_num: None,
            sap_error: None,
            sap_response_json: None,
            posted_at: None,
            created_at: now,
            updated_at: now,
            lines: request
                .lines
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, line)| line.into_line(i as i32))
                .collect(),
        };
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SalesOrder>> {
        Ok(self.orders.lock().unwrap().iter().find(|o| o.id == id).cloned())
    }

    async fn list(&self, query: &ListSalesOrdersQuery) -> Result<Vec<SalesOrder>> {
        let orders = self.orders.lock().unwrap();
        Ok(orders
            .iter()
            .rev()
            .filter(|o| query.posted.map_or(true, |p| o.is_posted_to_sap == p))
            .filter(|o| query.card_code.as_deref().map_or(true, |c| o.card_code == c.trim()))
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect())
    }

    async fn update_unposted(&self, id: Uuid, request: &UpdateSalesOrderRequest) -> Result<Option<SalesOrder>> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.iter_mut().find(|o| o.id == id && !o.is_posted_to_sap) else {
            return Ok(None);
        };

        if let Some(card_code) = &request.card_code {
            order.card_code = card_code.trim().to_string();
        }
        if let Some(card_name) = &request.card_name {
            order.card_name = Some(card_name.clone());
        }
        if let Some(comments) = &request.comments {
            order.comments = Some(comments.clone());
        }
        if let Some(doc_due_date) = request.doc_due_date {
            order.doc_due_date = doc_due_date;
        }
        if let Some(lines) = &request.lines {
            order.lines = lines
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, line)| line.into_line(i as i32))
                .collect();
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn record_posting_success(
        &self,
        id: Uuid,
        doc_entry: i64,
        doc_num: i64,
        response: &Value,
    ) -> Result<SalesOrder> {
        self.modify(id, |order| {
            order.status = SalesOrderStatus::Posted;
            order.is_posted_to_sap = true;
            order.sap_doc_entry = Some(doc_entry);
            order.sap_doc_num = Some(doc_num);
            order.sap_error = None;
            order.sap_response_json = Some(response.clone());
            order.posted_at = Some(Utc::now());
        })
        .ok_or_else(|| field_portal::middleware::AppError::NotFound("Sales order not found".to_string()))
    }

    async fn record_posting_failure(&self, id: Uuid, error: &str, response: Option<&Value>) -> Result<SalesOrder> {
        self.modify(id, |order| {
            if order.is_posted_to_sap {
                return;
            }
            order.status = SalesOrderStatus::Failed;
            order.sap_error = Some(error.to_string());
            order.sap_response_json = response.cloned();
        })
        .ok_or_else(|| field_portal::middleware::AppError::NotFound("Sales order not found".to_string()))
    }
}

// ============================================================================
// Mock SAP Service Layer
// ============================================================================

/// Business partners the mock knows about.
pub const KNOWN_PARTNERS: [(&str, &str); 2] = [("C001", "Alpha Agro"), ("ORC00196", "Kissan Traders")];

#[derive(Debug, Default)]
pub struct MockSapState {
    pub logins: usize,
    pub session: Option<String>,
    pub password: String,
    pub orders: Vec<Value>,
    pub partners_created: Vec<Value>,
}

pub type SharedSapState = Arc<RwLock<MockSapState>>;

pub struct MockServiceLayer {
    pub addr: SocketAddr,
    pub state: SharedSapState,
}

impl MockServiceLayer {
    pub async fn start() -> Self {
        let state: SharedSapState = Arc::new(RwLock::new(MockSapState {
            password: "1234".to_string(),
            ..Default::default()
        }));

        let app = Router::new().fallback(dispatch).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock Service Layer");
        let addr = listener.local_addr().expect("mock address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock Service Layer");
        });

        Self { addr, state }
    }

    pub async fn logins(&self) -> usize {
        self.state.read().await.logins
    }

    /// Drop the server-side session, as SAP does after its timeout.
    pub async fn expire_session(&self) {
        self.state.write().await.session = None;
    }

    pub async fn set_password(&self, password: &str) {
        self.state.write().await.password = password.to_string();
    }
}

fn sap_error(status: StatusCode, code: i64, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"code": code, "message": {"lang": "en-us", "value": message}}})),
    )
        .into_response()
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .map(str::trim)
        .find_map(|c| c.strip_prefix("B1SESSION="))
        .map(str::to_string)
}

fn partner(code: &str) -> Option<Value> {
    KNOWN_PARTNERS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(c, name)| json!({"CardCode": c, "CardName": name, "CardType": "cCustomer", "CurrentAccountBalance": 1250.5}))
}

async fn dispatch(
    State(state): State<SharedSapState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/b1s/v1/");
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    if method == Method::POST && path == "Login" {
        let mut state = state.write().await;
        if body["Password"] != json!(state.password) {
            return sap_error(StatusCode::UNAUTHORIZED, -304, "Fail to get DB Credentials from SLD");
        }
        state.logins += 1;
        let session = format!("sess-{}", state.logins);
        state.session = Some(session.clone());
        return Json(json!({"SessionId": session, "Version": "1000190", "SessionTimeout": 30})).into_response();
    }

    if method == Method::POST && path == "Logout" {
        state.write().await.session = None;
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut state = state.write().await;
    if state.session.is_none() || session_cookie(&headers) != state.session {
        return sap_error(StatusCode::UNAUTHORIZED, 301, "Invalid session or session already timeout.");
    }

    match (method.as_str(), path) {
        ("POST", "SalesOrders") => {
            let card_code = body["CardCode"].as_str().unwrap_or_default().to_string();
            if partner(&card_code).is_none() {
                return sap_error(
                    StatusCode::BAD_REQUEST,
                    -10,
                    &format!("1320000140 - Invalid BP code '{}'", card_code),
                );
            }
            let doc_entry = 100 + state.orders.len() as i64 + 1;
            let created = json!({"DocEntry": doc_entry, "DocNum": 5000 + doc_entry, "CardCode": card_code});
            state.orders.push(body);
            (StatusCode::CREATED, Json(created)).into_response()
        }
        ("GET", p) if p.starts_with("SalesOrders(") => {
            let doc_entry: i64 = p
                .trim_start_matches("SalesOrders(")
                .trim_end_matches(')')
                .parse()
                .unwrap_or_default();
            match state.orders.get((doc_entry - 101).max(0) as usize) {
                Some(order) if doc_entry > 100 => Json(json!({"DocEntry": doc_entry, "Order": order})).into_response(),
                _ => sap_error(StatusCode::NOT_FOUND, -2028, "No matching records found (ODBC -2028)"),
            }
        }
        ("GET", "BusinessPartners") => {
            let query = uri.query().unwrap_or_default();
            let decoded = percent_encoding::percent_decode_str(query).decode_utf8_lossy();
            let found: Vec<Value> = KNOWN_PARTNERS
                .iter()
                .filter(|(code, _)| decoded.contains(&format!("'{}'", code)) || decoded.contains("$top=1"))
                .filter_map(|(code, _)| partner(code))
                .take(if decoded.contains("$top=1") { 1 } else { usize::MAX })
                .collect();
            Json(json!({"value": found})).into_response()
        }
        ("POST", "BusinessPartners") => {
            state.partners_created.push(body.clone());
            (StatusCode::CREATED, Json(body)).into_response()
        }
        _ => sap_error(StatusCode::NOT_FOUND, -1, "Unknown resource"),
    }
}
