// Service Layer client against a mock SAP server
// Run with: cargo test --test service_layer_mock

mod common;

use std::sync::Arc;

use common::{config_for_mock, MockServiceLayer};
use field_portal::services::erp::{
    NewBusinessPartner, SalesOrderDocument, SalesOrderDocumentLine, ServiceLayerClient, ServiceLayerCredentials,
    ServiceLayerError, SessionState,
};
use rust_decimal_macros::dec;

fn client(mock: &MockServiceLayer, password: &str) -> ServiceLayerClient {
    let config = config_for_mock(mock.addr);
    ServiceLayerClient::new(
        &config.service_layer,
        ServiceLayerCredentials::new("manager", password),
        "4B-BIO_APP",
    )
    .expect("client")
}

fn document(card_code: &str) -> SalesOrderDocument {
    SalesOrderDocument {
        card_code: card_code.to_string(),
        card_name: None,
        doc_date: "2024-07-01".to_string(),
        doc_due_date: "2024-07-01".to_string(),
        tax_date: None,
        comments: None,
        contact_person_code: None,
        federal_tax_id: None,
        pay_to_code: None,
        address: None,
        secondary_card_code: None,
        secondary_card_name: None,
        document_lines: vec![SalesOrderDocumentLine {
            line_num: 0,
            item_code: "FG00292".to_string(),
            item_description: None,
            quantity: dec!(2),
            unit_price: dec!(1500),
            discount_percent: dec!(0),
            tax_code: None,
            warehouse_code: None,
            policy: None,
        }],
    }
}

#[tokio::test]
async fn test_login_then_create_sales_order() {
    let mock = MockServiceLayer::start().await;
    let client = client(&mock, "1234");
    assert_eq!(client.status(), SessionState::Unauthenticated);

    let created = client.create_sales_order(&document("C001")).await.unwrap();
    assert_eq!(created.doc_entry, 101);
    assert_eq!(created.doc_num, 5101);
    assert!(matches!(client.status(), SessionState::Authenticated { .. }));

    // the session is reused
    client.create_sales_order(&document("C001")).await.unwrap();
    assert_eq!(mock.logins().await, 1);

    let stored = mock.state.read().await.orders[0].clone();
    assert_eq!(stored["DocumentLines"][0]["Quantity"], serde_json::json!(2.0));
}

#[tokio::test]
async fn test_rejected_session_logs_in_again_once() {
    let mock = MockServiceLayer::start().await;
    let client = client(&mock, "1234");

    client.create_sales_order(&document("C001")).await.unwrap();
    mock.expire_session().await;

    let created = client.create_sales_order(&document("C001")).await.unwrap();
    assert_eq!(created.doc_entry, 102);
    assert_eq!(mock.logins().await, 2);
}

#[tokio::test]
async fn test_business_error_keeps_sap_payload() {
    let mock = MockServiceLayer::start().await;
    let client = client(&mock, "1234");

    let err = client.create_sales_order(&document("NOPE")).await.unwrap_err();
    match &err {
        ServiceLayerError::Business { code, message, .. } => {
            assert_eq!(*code, -10);
            assert!(message.contains("Invalid BP code 'NOPE'"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.payload().unwrap()["error"]["code"], -10);
    assert!(mock.state.read().await.orders.is_empty());
}

#[tokio::test]
async fn test_wrong_password_fails_login() {
    let mock = MockServiceLayer::start().await;
    let client = client(&mock, "wrong");

    let err = client.get_business_partner("C001").await.unwrap_err();
    assert!(matches!(err, ServiceLayerError::LoginFailed(_)));
    assert!(matches!(client.status(), SessionState::LoginFailed { .. }));
    assert_eq!(mock.logins().await, 0);
}

#[tokio::test]
async fn test_business_partner_lookup() {
    let mock = MockServiceLayer::start().await;
    let client = client(&mock, "1234");

    let partner = client.get_business_partner("C001").await.unwrap();
    assert_eq!(partner["CardName"], "Alpha Agro");

    let details = client.get_business_partner_details("ORC00196").await.unwrap();
    assert_eq!(details.card_name.as_deref(), Some("Kissan Traders"));
    assert_eq!(details.current_account_balance, Some(dec!(1250.5)));

    let missing = client.get_business_partner("ZZZ").await.unwrap_err();
    assert!(matches!(missing, ServiceLayerError::NotFound(_)));
}

#[tokio::test]
async fn test_create_business_partner_passes_extra_fields() {
    let mock = MockServiceLayer::start().await;
    let client = client(&mock, "1234");

    let partner: NewBusinessPartner = serde_json::from_value(serde_json::json!({
        "CardCode": "C200",
        "CardName": "New Dealer",
        "U_Region": "South"
    }))
    .unwrap();
    client.create_business_partner(&partner).await.unwrap();

    let sent = mock.state.read().await.partners_created[0].clone();
    assert_eq!(sent["CardType"], "cCustomer");
    assert_eq!(sent["U_Region"], "South");
}

#[tokio::test]
async fn test_concurrent_requests_share_one_login() {
    let mock = MockServiceLayer::start().await;
    let client = Arc::new(client(&mock, "1234"));

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_business_partner("C001").await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(mock.logins().await, 1);
}

#[tokio::test]
async fn test_logout_and_connection_test() {
    let mock = MockServiceLayer::start().await;
    let client = client(&mock, "1234");

    assert!(client.test_connection().await.unwrap());
    client.logout().await.unwrap();
    assert_eq!(client.status(), SessionState::Unauthenticated);
    assert!(mock.state.read().await.session.is_none());
}
