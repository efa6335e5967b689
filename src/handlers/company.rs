use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    middleware::{error_handling::Result, Company},
    models::report::ReportResponse,
    services::company_schema::CompanyOption,
    AppState,
};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Companies the portal can switch between, and the one this request
/// resolved to.
pub async fn list_companies(State(state): State<AppState>, company: Company) -> Result<Json<Value>> {
    let schemas = state.settings.current().await?;
    let options: ReportResponse<Vec<CompanyOption>> = ReportResponse::from_rows(schemas.company_options());

    Ok(Json(json!({
        "success": options.success,
        "count": options.count,
        "data": options.data,
        "selected": {"key": company.key, "schema": company.schema},
    })))
}
