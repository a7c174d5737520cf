use axum::extract::State;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::checkout::{self, ConnectionCheck, RefundReceipt};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    /// Omit to refund whatever has not been refunded yet
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /admin/orders/{order_id}/refund
pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundReceipt>> {
    tracing::info!(order_id = %order_id, amount = ?request.amount, "Refund requested");
    checkout::refund_order(&state, &order_id, request.amount, request.reason.as_deref())
        .await
        .map(Json)
}

/// POST /admin/test-connection
pub async fn test_connection(State(state): State<AppState>) -> Json<ConnectionCheck> {
    Json(checkout::test_connection(&state).await)
}
