use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Shared user-facing error messages.
pub mod msg {
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const CART_NOT_FOUND: &str = "Cart not found";
    pub const CART_EMPTY: &str = "Cart is empty";
    pub const GATEWAY_UNAVAILABLE: &str = "Payment gateway is not available";
    pub const WRONG_PAYMENT_METHOD: &str =
        "This order was not paid through Apple Pay and cannot be handled by this gateway.";
    pub const PAYMENT_INIT_FAILED: &str = "Unable to initiate payment. Please try again.";
    pub const SESSION_CREATE_FAILED: &str = "Failed to create payment session";
    pub const SECURITY_CHECK_FAILED: &str = "Security verification failed";
    pub const TRANSACTION_ID_MISSING: &str = "Transaction ID not found";
    pub const REFUND_FAILED: &str = "Refund processing failed.";
    pub const AMOUNT_OUT_OF_RANGE: &str = "Amount is out of range";
    pub const INVALID_AMOUNT: &str = "Refund amount must be greater than zero";
    pub const INVALID_HMAC_KEY: &str = "Configured HMAC key is not valid hex";
    pub const ORDER_ALREADY_PAID: &str = "Order is already paid";
    pub const ORDER_NOT_PAYABLE: &str = "Order can no longer be paid";
    pub const ORDER_NOT_REFUNDABLE: &str = "Only paid orders can be refunded";
    pub const REFUND_EXCEEDS_REMAINING: &str = "Refund amount exceeds the amount left to refund";
    pub const REFUND_IN_PROGRESS: &str = "Order changed while the refund was prepared. Please retry.";
    pub const CREDENTIALS_MISSING: &str =
        "API credentials not configured. Please configure your API Key and Merchant Account first.";
    pub const UNEXPECTED_PROVIDER_RESPONSE: &str =
        "Unexpected response from Adyen API. Please check your credentials.";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "Bad gateway", Some(msg.clone())),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable",
                Some(msg.clone()),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Converts `Ok(None)` lookups into a `NotFound` error.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
