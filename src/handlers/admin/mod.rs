mod refunds;

pub use refunds::*;

use axum::{Router, middleware, routing::post};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/orders/{order_id}/refund", post(refund_order))
        .route("/admin/test-connection", post(test_connection))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
