pub mod adyen;
pub mod common;

pub use adyen::handle_adyen_webhook;

use axum::{Router, middleware, routing::post};

use crate::db::AppState;
use crate::middleware::webhook_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/webhook/adyen", post(handle_adyen_webhook))
        .layer(middleware::from_fn_with_state(state, webhook_auth))
}
