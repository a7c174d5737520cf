mod checkout;
mod payment_return;

pub use checkout::*;
pub use payment_return::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/adyen/return", get(payment_return))
        .route("/checkout/session", post(create_cart_session))
        .route("/checkout/orders/{order_id}/pay", post(pay_order))
        .route("/checkout/orders/{order_id}/payments", post(submit_payment))
}
