//! Error handling for the API gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error information
    pub error: ErrorInfo,
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Detailed error information
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code (string identifier for the error type)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors
#[derive(Debug, thiserror::Error)]
#[allow(dead_code)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Common error: {0}")]
    Common(#[from] common::error::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Generate a request ID for tracking errors
        let request_id = Uuid::new_v4().to_string();

        // Log the error with request ID for backend tracing
        tracing::error!("API Error [{}]: {:?}", request_id, &self);

        let (status, code, details) = match &self {
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                None,
            ),
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                None,
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                None,
            ),
            ApiError::Common(e) => match e {
                // Client errors (4xx)
                common::error::Error::AccountNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "account_not_found",
                    None,
                ),
                common::error::Error::AlreadyRegistered(_) => (
                    StatusCode::CONFLICT,
                    "already_registered",
                    None,
                ),
                common::error::Error::IllegalRequest(_) => (
                    StatusCode::BAD_REQUEST,
                    "illegal_request",
                    None,
                ),
                common::error::Error::InsufficientFunds(_) => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_funds",
                    None,
                ),
                common::error::Error::InsufficientHoldings(_) => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_holdings",
                    None,
                ),
                common::error::Error::InstrumentNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "instrument_not_found",
                    None,
                ),
                common::error::Error::InsufficientInventory(_) => (
                    StatusCode::CONFLICT,
                    "insufficient_inventory",
                    None,
                ),
                common::error::Error::PriceStale(_) => (
                    StatusCode::CONFLICT,
                    "price_stale",
                    None,
                ),
                common::error::Error::RemoteTimeout(_) => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "remote_timeout",
                    None,
                ),
                common::error::Error::SettlementFailed(_) => (
                    StatusCode::CONFLICT,
                    "settlement_failed",
                    Some(serde_json::json!({
                        "cause": e.root_cause().to_string(),
                    })),
                ),

                // Server errors (5xx)
                common::error::Error::ConfigurationError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    None,
                ),
                common::error::Error::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    None,
                ),
                common::error::Error::Database(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    Some(serde_json::json!({
                        "db_error": e.to_string(),
                        "code": e.as_database_error().map(|dbe| dbe.code().map(|c| c.to_string())),
                    })),
                ),
                common::error::Error::Migration(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "migration_error",
                    None,
                ),
                common::error::Error::Serialization(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "serialization_error",
                    None,
                ),
                common::error::Error::DecimalError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "decimal_error",
                    None,
                ),
            },
        };

        // Create the error response
        let error_response = ErrorResponse {
            error: ErrorInfo {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
            request_id: Some(request_id),
        };

        // Return the response with appropriate status code
        (status, Json(error_response)).into_response()
    }
}
