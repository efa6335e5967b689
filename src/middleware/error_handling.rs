// ============================================================================
// Error Handling - HTTP edge of the portal
// ============================================================================
//
// Internal details (SQL text, driver messages, transport errors) are logged
// server-side with tracing::error! and replaced by a generic message in the
// response. SAP business-validation messages are the exception: operators
// need them verbatim to fix the order, so they are returned as-is.
//
// ============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::services::erp::ServiceLayerError;
use crate::services::hana::HanaError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("HANA error: {0}")]
    Hana(#[from] HanaError),

    #[error("SAP Service Layer error: {0}")]
    ServiceLayer(#[from] ServiceLayerError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Validation(errors) => {
                let mut fields: Vec<String> =
                    errors.errors().keys().map(|k| k.to_string()).collect();
                fields.sort_unstable();
                (
                    StatusCode::BAD_REQUEST,
                    format!("Validation failed: {}", fields.join(", ")),
                )
            }
            AppError::JsonParsing(ref e) => {
                tracing::error!("JSON parsing error: {:?}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON format".to_string())
            }
            AppError::Hana(err) => {
                tracing::error!("HANA error: {}", err);
                match err {
                    HanaError::NotConfigured(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "HANA connection is not configured".to_string(),
                    ),
                    HanaError::Connect(_) | HanaError::Timeout(_) => (
                        StatusCode::BAD_GATEWAY,
                        "HANA is unreachable".to_string(),
                    ),
                    HanaError::Query(_) | HanaError::Decode(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Report query failed".to_string(),
                    ),
                }
            }
            AppError::ServiceLayer(err) => {
                tracing::error!("SAP Service Layer error: {}", err);
                match err {
                    ServiceLayerError::Business { message, .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, message)
                    }
                    ServiceLayerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                    ServiceLayerError::CacheRefresh(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "SAP is refreshing its cache, try again shortly".to_string(),
                    ),
                    ServiceLayerError::ConfigError(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "SAP Service Layer is not configured".to_string(),
                    ),
                    ServiceLayerError::LoginFailed(_) => {
                        (StatusCode::BAD_GATEWAY, "SAP login failed".to_string())
                    }
                    _ => (StatusCode::BAD_GATEWAY, "SAP Service Layer is unreachable".to_string()),
                }
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
