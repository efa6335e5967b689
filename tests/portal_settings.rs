// Company mapping and Service Layer credentials edited while the portal runs
// Run with: cargo test --test portal_settings

mod common;

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};

use common::{config, MemoryHana, MemorySalesOrders, MemorySettings, MockServiceLayer};
use field_portal::{create_app, AppState};

async fn server(pairs: &[(&str, &str)], settings: Arc<MemorySettings>, hana: Arc<MemoryHana>) -> TestServer {
    let state = AppState::load(config(pairs), hana, settings, Arc::new(MemorySalesOrders::default()))
        .await
        .unwrap();
    TestServer::new(create_app(state)).unwrap()
}

fn mapping(orang_schema: &str) -> Value {
    json!({"4B-BIO": "4B-BIO_APP", "4B-ORANG": orang_schema})
}

#[tokio::test]
async fn test_company_mapping_change_is_picked_up() {
    let settings = Arc::new(MemorySettings::default().with("SAP_COMPANY_DB", mapping("4B-ORANG_APP")));
    let hana = Arc::new(MemoryHana::new());
    let server = server(&[("SETTINGS_REFRESH_SECS", "0")], settings.clone(), hana.clone()).await;

    server.get("/api/sap/territories?database=4B-ORANG").await.assert_status_ok();
    settings.set("SAP_COMPANY_DB", mapping("4B-ORANG_TEST"));
    server.get("/api/sap/territories?database=4B-ORANG").await.assert_status_ok();

    let schemas: Vec<String> = hana.calls().into_iter().map(|(schema, _)| schema).collect();
    assert_eq!(schemas, vec!["4B-ORANG_APP", "4B-ORANG_TEST"]);

    let body: Value = server.get("/api/sap/companies?database=4B-ORANG").await.json();
    assert_eq!(body["selected"]["schema"], "4B-ORANG_TEST");
}

#[tokio::test]
async fn test_mapping_is_cached_within_refresh_window() {
    let settings = Arc::new(MemorySettings::default().with("SAP_COMPANY_DB", mapping("4B-ORANG_APP")));
    let hana = Arc::new(MemoryHana::new());
    let server = server(&[("SETTINGS_REFRESH_SECS", "300")], settings.clone(), hana.clone()).await;

    settings.set("SAP_COMPANY_DB", mapping("4B-ORANG_TEST"));
    server.get("/api/sap/territories?database=4B-ORANG").await.assert_status_ok();

    assert_eq!(hana.calls()[0].0, "4B-ORANG_APP");
}

#[tokio::test]
async fn test_empty_default_company_uses_hana_schema() {
    let settings = Arc::new(MemorySettings::default());
    let hana = Arc::new(MemoryHana::new());
    let server = server(&[("HANA_SCHEMA", "\"4B-AGRI_LIVE\"")], settings, hana.clone()).await;

    server.get("/api/sap/territories").await.assert_status_ok();
    assert_eq!(hana.calls()[0].0, "4B-AGRI_LIVE");

    let body: Value = server.get("/api/sap/companies").await.json();
    assert_eq!(body["selected"]["key"], "");
    assert_eq!(body["selected"]["schema"], "4B-AGRI_LIVE");
}

#[tokio::test]
async fn test_rotated_credentials_are_used_for_posting() {
    let mock = MockServiceLayer::start().await;
    mock.set_password("old").await;

    let port = mock.addr.port().to_string();
    let settings = Arc::new(
        MemorySettings::default()
            .with("SAP_COMPANY_DB", mapping("4B-ORANG_APP"))
            .with("sap_credential", json!({"Username": "manager", "Passwords": "old"})),
    );
    let server = server(
        &[
            ("SAP_B1S_HOST", "127.0.0.1"),
            ("SAP_B1S_PORT", port.as_str()),
            ("SAP_USE_HTTP", "true"),
            ("SAP_TIMEOUT_SECS", "5"),
            ("SETTINGS_REFRESH_SECS", "0"),
        ],
        settings.clone(),
        Arc::new(MemoryHana::new()),
    )
    .await;

    let order = json!({
        "card_code": "C001",
        "lines": [{"item_code": "FG00292", "quantity": 2, "unit_price": 100}]
    });

    let first: Value = server.post("/api/sales-orders?database=4B-BIO").json(&order).await.json();
    let posted = server.post(&format!("/api/sales-orders/{}/post-to-sap", first["id"].as_str().unwrap())).await;
    posted.assert_status_ok();
    assert_eq!(mock.logins().await, 1);

    // operator rotates the SAP password and the portal setting
    mock.set_password("new").await;
    mock.expire_session().await;
    settings.set("sap_credential", json!({"Username": "manager", "Passwords": "new"}));

    let second: Value = server.post("/api/sales-orders?database=4B-BIO").json(&order).await.json();
    let posted = server.post(&format!("/api/sales-orders/{}/post-to-sap", second["id"].as_str().unwrap())).await;
    posted.assert_status_ok();
    assert_eq!(posted.json::<Value>()["order"]["sap_doc_num"], 5102);
    assert_eq!(mock.logins().await, 2);
}
