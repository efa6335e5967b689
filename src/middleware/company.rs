// Company selection for SAP-backed routes.
//
// The company key comes from `?database=` / `?company_db=`, then the
// `X-Company-Db` header, then DEFAULT_COMPANY_DB, and is resolved to a
// HANA schema through the current SAP_COMPANY_DB mapping. An empty key
// resolves to HANA_SCHEMA.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use super::error_handling::AppError;
use crate::AppState;

pub const COMPANY_HEADER: &str = "x-company-db";

#[derive(Debug, Default, Deserialize)]
struct CompanySelector {
    database: Option<String>,
    company_db: Option<String>,
}

/// The requested company key and the schema it resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub key: String,
    pub schema: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// The raw company key for a request, before schema resolution.
pub fn requested_company_key(parts: &Parts, default_key: &str) -> String {
    let selector = Query::<CompanySelector>::try_from_uri(&parts.uri)
        .map(|Query(selector)| selector)
        .unwrap_or_default();

    let header = parts
        .headers
        .get(COMPANY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    non_empty(selector.database)
        .or_else(|| non_empty(selector.company_db))
        .or_else(|| non_empty(header))
        .unwrap_or_else(|| default_key.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for Company {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = requested_company_key(parts, &state.config.default_company_db);
        let schema = state.settings.current().await?.resolve(&key);
        Ok(Company { key, schema })
    }
}
