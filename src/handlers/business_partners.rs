// Service Layer passthrough: business partners and connectivity check

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    middleware::{error_handling::Result, Company},
    services::erp::{BusinessPartnerDetails, NewBusinessPartner, SessionState},
    utils::log_sanitizer::sanitize_for_log,
    AppState,
};

pub async fn get_business_partner(
    State(state): State<AppState>,
    company: Company,
    Path(card_code): Path<String>,
) -> Result<Json<Value>> {
    let client = state.service_layer.client(&company.schema)?;
    let partner = client.get_business_partner(card_code.trim()).await?;
    Ok(Json(partner))
}

pub async fn get_business_partner_summary(
    State(state): State<AppState>,
    company: Company,
    Path(card_code): Path<String>,
) -> Result<Json<BusinessPartnerDetails>> {
    let client = state.service_layer.client(&company.schema)?;
    let details = client.get_business_partner_details(card_code.trim()).await?;
    Ok(Json(details))
}

pub async fn create_business_partner(
    State(state): State<AppState>,
    company: Company,
    Json(partner): Json<NewBusinessPartner>,
) -> Result<(StatusCode, Json<Value>)> {
    tracing::info!(
        "Creating business partner {} in {}",
        sanitize_for_log(&partner.card_code),
        company.schema
    );
    let client = state.service_layer.client(&company.schema)?;
    let created = client.create_business_partner(&partner).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Serialize)]
pub struct ConnectionTestResponse {
    pub success: bool,
    pub company_db: String,
    pub session: &'static str,
}

fn session_label(state: &SessionState) -> &'static str {
    match state {
        SessionState::Unauthenticated => "unauthenticated",
        SessionState::Authenticating => "authenticating",
        SessionState::Authenticated { .. } => "authenticated",
        SessionState::Expired => "expired",
        SessionState::LoginFailed { .. } => "login_failed",
    }
}

pub async fn test_connection(
    State(state): State<AppState>,
    company: Company,
) -> Result<Json<ConnectionTestResponse>> {
    let client = state.service_layer.client(&company.schema)?;
    let success = client.test_connection().await?;

    Ok(Json(ConnectionTestResponse {
        success,
        company_db: client.company_db().to_string(),
        session: session_label(&client.status()),
    }))
}
