use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkout::{
    self, CheckoutRedirect, DirectPaymentResult, GuestSession,
};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};

#[derive(Debug, Deserialize)]
pub struct CartSessionRequest {
    pub cart_id: String,
    pub nonce: String,
    /// Billing country entered so far, if any
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CartSessionData {
    Session(GuestSession),
    Error { message: String },
}

/// `{success, data}` envelope the storefront button script expects.
#[derive(Debug, Serialize)]
pub struct CartSessionResponse {
    pub success: bool,
    pub data: CartSessionData,
}

fn status_for(error: &AppError) -> (StatusCode, String) {
    match error {
        AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
        AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
        AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
        AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
        AppError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m.clone()),
        AppError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
        AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
        other => {
            tracing::error!("Cart session error: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error".into())
        }
    }
}

/// POST /checkout/session
pub async fn create_cart_session(
    State(state): State<AppState>,
    Json(request): Json<CartSessionRequest>,
) -> impl IntoResponse {
    let result = checkout::create_cart_session(
        &state,
        &request.cart_id,
        &request.nonce,
        request.country.as_deref(),
    )
    .await;

    match result {
        Ok(session) => (
            StatusCode::OK,
            Json(CartSessionResponse {
                success: true,
                data: CartSessionData::Session(session),
            }),
        ),
        Err(e) => {
            let (status, message) = status_for(&e);
            (
                status,
                Json(CartSessionResponse {
                    success: false,
                    data: CartSessionData::Error { message },
                }),
            )
        }
    }
}

/// POST /checkout/orders/{order_id}/pay
pub async fn pay_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<CheckoutRedirect>> {
    checkout::create_checkout_session(&state, &order_id)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct DirectPaymentBody {
    #[serde(alias = "paymentMethod")]
    pub payment_method: Value,
}

/// POST /checkout/orders/{order_id}/payments
pub async fn submit_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<DirectPaymentBody>,
) -> Result<Json<DirectPaymentResult>> {
    if !body.payment_method.is_object() {
        return Err(AppError::BadRequest("payment_method must be an object".into()));
    }
    checkout::process_direct_payment(&state, &order_id, body.payment_method)
        .await
        .map(Json)
}
