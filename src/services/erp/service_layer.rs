// SAP Business One Service Layer client
// Session-cookie authentication (POST /Login, B1SESSION) with an explicit
// expiry, single-flight re-login and one retry after an HTTP 401

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{header, Client, Method, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::ServiceLayerConfig;
use crate::utils::log_sanitizer::{redact_session_id, sanitize_for_log};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum ServiceLayerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SAP error {code}: {message}")]
    Business {
        code: i64,
        message: String,
        payload: Value,
    },

    #[error("SAP cache refresh failure: {0}")]
    CacheRefresh(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("SAP API error ({0}): {1}")]
    Api(StatusCode, String),
}

impl ServiceLayerError {
    /// The SAP error payload, when SAP returned one.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            ServiceLayerError::Business { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceLayerError>;

/// SAP codes reported while the company cache is being rebuilt.
const CACHE_REFRESH_CODES: [i64; 2] = [-2001, -1101];

// ============================================================================
// Credentials
// ============================================================================

#[derive(Clone, PartialEq)]
pub struct ServiceLayerCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ServiceLayerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLayerCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ServiceLayerCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the `sap_credential` setting: `{"Username": .., "Passwords": ..}`,
    /// stored either as an object or as a JSON-encoded string.
    pub fn from_setting_value(value: &Value) -> Option<Self> {
        let decoded;
        let object = match value {
            Value::Object(map) => map,
            Value::String(raw) => {
                decoded = serde_json::from_str::<Value>(raw.trim()).ok()?;
                decoded.as_object()?
            }
            _ => return None,
        };

        let username = object.get("Username")?.as_str()?.trim();
        let password = object
            .get("Passwords")
            .or_else(|| object.get("Password"))?
            .as_str()?;

        if username.is_empty() {
            return None;
        }
        Some(Self::new(username, password))
    }
}

// ============================================================================
// Data Models
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "SessionId")]
    session_id: String,
    /// Minutes
    #[serde(rename = "SessionTimeout", default)]
    session_timeout: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SalesOrderDocumentLine {
    pub line_num: i32,
    pub item_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_description: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_code: Option<String>,
    #[serde(rename = "U_Policy", skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// Body of `POST /SalesOrders`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SalesOrderDocument {
    pub card_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_name: Option<String>,
    pub doc_date: String,
    pub doc_due_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_person_code: Option<i32>,
    #[serde(rename = "FederalTaxID", skip_serializing_if = "Option::is_none")]
    pub federal_tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_to_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "U_SCardCode", skip_serializing_if = "Option::is_none")]
    pub secondary_card_code: Option<String>,
    #[serde(rename = "U_SCardName", skip_serializing_if = "Option::is_none")]
    pub secondary_card_name: Option<String>,
    pub document_lines: Vec<SalesOrderDocumentLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSalesOrder {
    pub doc_entry: i64,
    pub doc_num: i64,
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BusinessPartnerDetails {
    pub card_code: String,
    #[serde(default)]
    pub card_name: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub current_account_balance: Option<Decimal>,
}

/// Body of `POST /BusinessPartners`. Fields beyond the common ones pass
/// through untouched.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NewBusinessPartner {
    pub card_code: String,
    pub card_name: String,
    #[serde(default = "default_card_type")]
    pub card_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_card: Option<String>,
    #[serde(rename = "FederalTaxID", default, skip_serializing_if = "Option::is_none")]
    pub federal_tax_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_card_type() -> String {
    "cCustomer".to_string()
}

// ============================================================================
// Session State
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated {
        session_id: String,
        expires_at: DateTime<Utc>,
    },
    Expired,
    LoginFailed {
        reason: String,
    },
}

const MAX_SESSION_SECS: i64 = 86_400;

/// Session lifetime: SAP's own timeout, capped by the configured TTL.
pub fn session_expiry(
    logged_in_at: DateTime<Utc>,
    session_timeout_minutes: Option<i64>,
    ttl: std::time::Duration,
) -> DateTime<Utc> {
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(MAX_SESSION_SECS).min(MAX_SESSION_SECS);
    let effective = match session_timeout_minutes {
        Some(minutes) if minutes > 0 => ttl_secs.min(minutes.saturating_mul(60)),
        _ => ttl_secs,
    };
    logged_in_at + Duration::seconds(effective)
}

/// OData string literal: single quotes doubled.
pub fn odata_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Classify an error body. SAP reports business failures as
/// `{"error": {"code": .., "message": {"value": ..}}}`.
pub fn classify_error(status: StatusCode, body: &str) -> ServiceLayerError {
    if let Ok(payload) = serde_json::from_str::<Value>(body) {
        if let Some(error) = payload.get("error") {
            let code = error
                .get("code")
                .and_then(|c| c.as_i64().or_else(|| c.as_str().and_then(|s| s.trim().parse().ok())))
                .unwrap_or(0);
            let message = error
                .get("message")
                .and_then(|m| m.get("value").and_then(Value::as_str).or_else(|| m.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| format!("SAP returned HTTP {}", status.as_u16()));

            if CACHE_REFRESH_CODES.contains(&code) || message.contains("Critical cache refresh failure") {
                return ServiceLayerError::CacheRefresh(message);
            }

            return ServiceLayerError::Business {
                code,
                message,
                payload,
            };
        }
    }

    let text: String = body.chars().take(500).collect();
    match status {
        StatusCode::NOT_FOUND => ServiceLayerError::NotFound(text),
        _ => ServiceLayerError::Api(status, text),
    }
}

// ============================================================================
// Service Layer Client
// ============================================================================

/// Client bound to one company database. Owns its session.
pub struct ServiceLayerClient {
    base_url: String,
    company_db: String,
    credentials: ServiceLayerCredentials,
    session_ttl: std::time::Duration,
    http_client: Client,
    state: RwLock<SessionState>,
    login_lock: Mutex<()>,
}

impl ServiceLayerClient {
    pub fn new(
        config: &ServiceLayerConfig,
        credentials: ServiceLayerCredentials,
        company_db: impl Into<String>,
    ) -> Result<Self> {
        let company_db = company_db.into();
        if company_db.trim().is_empty() {
            return Err(ServiceLayerError::ConfigError("company database is required".to_string()));
        }
        if credentials.username.trim().is_empty() {
            return Err(ServiceLayerError::ConfigError("username is required".to_string()));
        }

        let base_url = config.base_url();
        url::Url::parse(&base_url)
            .map_err(|e| ServiceLayerError::ConfigError(format!("invalid base URL {}: {}", base_url, e)))?;

        let http_client = config
            .tls
            .apply(Client::builder().timeout(config.timeout))
            .build()?;

        Ok(Self {
            base_url,
            company_db,
            credentials,
            session_ttl: config.session_ttl,
            http_client,
            state: RwLock::new(SessionState::Unauthenticated),
            login_lock: Mutex::new(()),
        })
    }

    pub fn company_db(&self) -> &str {
        &self.company_db
    }

    /// Current state, without blocking on an in-flight login.
    pub fn status(&self) -> SessionState {
        let state = self.read_state();
        match state {
            SessionState::Authenticated { expires_at, .. } if Utc::now() >= expires_at => {
                SessionState::Expired
            }
            other => other,
        }
    }

    fn read_state(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_state(&self, new_state: SessionState) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = new_state;
    }

    fn valid_session(&self) -> Option<String> {
        match self.status() {
            SessionState::Authenticated { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// Expire `session_id` unless another caller already replaced it.
    fn mark_expired(&self, session_id: &str) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if matches!(&*state, SessionState::Authenticated { session_id: current, .. } if current == session_id) {
            *state = SessionState::Expired;
        }
    }

    // ========================================================================
    // Session Management
    // ========================================================================

    /// Log in unconditionally, replacing any current session.
    pub async fn login(&self) -> Result<String> {
        let _guard = self.login_lock.lock().await;
        self.login_locked().await
    }

    async fn session(&self) -> Result<String> {
        if let Some(session_id) = self.valid_session() {
            return Ok(session_id);
        }

        let _guard = self.login_lock.lock().await;
        // Another caller may have logged in while we waited
        if let Some(session_id) = self.valid_session() {
            return Ok(session_id);
        }
        self.login_locked().await
    }

    async fn login_locked(&self) -> Result<String> {
        self.set_state(SessionState::Authenticating);
        tracing::info!(
            "🔐 SAP Service Layer login for company {} as {}",
            sanitize_for_log(&self.company_db),
            sanitize_for_log(&self.credentials.username)
        );

        let body = serde_json::json!({
            "UserName": self.credentials.username,
            "Password": self.credentials.password,
            "CompanyDB": self.company_db,
        });

        let response = match self
            .http_client
            .post(format!("{}/Login", self.base_url))
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.set_state(SessionState::LoginFailed {
                    reason: e.to_string(),
                });
                return Err(ServiceLayerError::Network(e));
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let reason = match classify_error(status, &text) {
                ServiceLayerError::Business { message, .. } | ServiceLayerError::CacheRefresh(message) => message,
                _ => format!("HTTP {}", status.as_u16()),
            };
            tracing::warn!(
                "⚠️  SAP login failed for company {}: {}",
                sanitize_for_log(&self.company_db),
                sanitize_for_log(&reason)
            );
            self.set_state(SessionState::LoginFailed {
                reason: reason.clone(),
            });
            return Err(ServiceLayerError::LoginFailed(reason));
        }

        let login: LoginResponse = match serde_json::from_str(&text) {
            Ok(login) => login,
            Err(e) => {
                let reason = format!("unexpected login response: {}", e);
                self.set_state(SessionState::LoginFailed {
                    reason: reason.clone(),
                });
                return Err(ServiceLayerError::LoginFailed(reason));
            }
        };

        let expires_at = session_expiry(Utc::now(), login.session_timeout, self.session_ttl);
        tracing::info!(
            "✅ SAP session {} established, expires at {}",
            redact_session_id(&login.session_id),
            expires_at.to_rfc3339()
        );

        self.set_state(SessionState::Authenticated {
            session_id: login.session_id.clone(),
            expires_at,
        });
        Ok(login.session_id)
    }

    /// End the current session. Errors from SAP are logged, not returned.
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.login_lock.lock().await;

        let session_id = match self.read_state() {
            SessionState::Authenticated { session_id, .. } => session_id,
            _ => {
                self.set_state(SessionState::Unauthenticated);
                return Ok(());
            }
        };

        let result = self
            .http_client
            .post(format!("{}/Logout", self.base_url))
            .header(header::COOKIE, format!("B1SESSION={}", session_id))
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!("SAP logout failed: {}", e);
        }

        self.set_state(SessionState::Unauthenticated);
        Ok(())
    }

    // ========================================================================
    // Request Execution
    // ========================================================================

    async fn send(&self, method: &Method, path: &str, body: Option<&Value>, session_id: &str) -> Result<Response> {
        let mut request = self
            .http_client
            .request(method.clone(), format!("{}/{}", self.base_url, path))
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, format!("B1SESSION={}", session_id));

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Run a request with the current session; on 401 log in again and
    /// retry exactly once.
    async fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let session_id = self.session().await?;
        let mut response = self.send(&method, path, body, &session_id).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!(
                "SAP session {} rejected, logging in again",
                redact_session_id(&session_id)
            );
            self.mark_expired(&session_id);

            let session_id = self.session().await?;
            response = self.send(&method, path, body, &session_id).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                self.mark_expired(&session_id);
                return Err(ServiceLayerError::LoginFailed(
                    "session rejected immediately after login".to_string(),
                ));
            }
        }

        Self::read_json(response).await
    }

    async fn read_json(response: Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn first_value(result: Value, card_code: &str) -> Result<Value> {
        result
            .get("value")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .cloned()
            .ok_or_else(|| ServiceLayerError::NotFound(format!("Business partner '{}' not found", card_code)))
    }

    // ========================================================================
    // Sales Orders
    // ========================================================================

    pub async fn create_sales_order(&self, document: &SalesOrderDocument) -> Result<CreatedSalesOrder> {
        let body = serde_json::to_value(document)?;
        let payload = self.execute(Method::POST, "SalesOrders", Some(&body)).await?;

        let doc_entry = payload.get("DocEntry").and_then(Value::as_i64);
        let doc_num = payload.get("DocNum").and_then(Value::as_i64);

        match (doc_entry, doc_num) {
            (Some(doc_entry), Some(doc_num)) => {
                tracing::info!("✅ SAP sales order {} created (DocEntry {})", doc_num, doc_entry);
                Ok(CreatedSalesOrder {
                    doc_entry,
                    doc_num,
                    payload,
                })
            }
            _ => Err(ServiceLayerError::Api(
                StatusCode::OK,
                "SalesOrders response carries no DocEntry/DocNum".to_string(),
            )),
        }
    }

    pub async fn get_sales_order(&self, doc_entry: i64) -> Result<Value> {
        self.execute(Method::GET, &format!("SalesOrders({})", doc_entry), None)
            .await
    }

    // ========================================================================
    // Business Partners
    // ========================================================================

    pub async fn get_business_partner(&self, card_code: &str) -> Result<Value> {
        let filter = format!("CardCode eq {}", odata_quote(card_code));
        let path = format!("BusinessPartners?$filter={}", encode(&filter));
        let result = self.execute(Method::GET, &path, None).await?;
        Self::first_value(result, card_code)
    }

    pub async fn get_business_partner_details(&self, card_code: &str) -> Result<BusinessPartnerDetails> {
        let filter = format!("CardCode eq {}", odata_quote(card_code));
        let path = format!(
            "BusinessPartners?$filter={}&$select={}",
            encode(&filter),
            encode("CardCode,CardName,CardType,CurrentAccountBalance")
        );
        let result = self.execute(Method::GET, &path, None).await?;
        let row = Self::first_value(result, card_code)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn create_business_partner(&self, partner: &NewBusinessPartner) -> Result<Value> {
        let body = serde_json::to_value(partner)?;
        let created = self.execute(Method::POST, "BusinessPartners", Some(&body)).await?;
        tracing::info!(
            "✅ SAP business partner {} created",
            sanitize_for_log(&partner.card_code)
        );
        Ok(created)
    }

    /// Log in and run a minimal read.
    pub async fn test_connection(&self) -> Result<bool> {
        self.session().await?;
        let result = self
            .execute(Method::GET, "BusinessPartners?$top=1&$select=CardCode", None)
            .await?;
        Ok(result.get("value").is_some())
    }
}

// ============================================================================
// Tests
// ============================================================================
