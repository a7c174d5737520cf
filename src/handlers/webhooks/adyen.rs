use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};

use crate::db::AppState;
use crate::payments::NotificationEnvelope;

use super::common::{BatchSummary, WebhookResult, process_notification_item};

/// Parse the envelope and reconcile every item against the order store.
///
/// Basic Auth has already been enforced by the route middleware.
pub fn handle_notification_batch(state: &AppState, body: &Bytes) -> WebhookResult {
    let envelope: NotificationEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(body_len = body.len(), "Invalid notification envelope: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid notification format");
        }
    };

    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let mut summary = BatchSummary::default();
    for raw in envelope.notification_items {
        summary.record(process_notification_item(&*conn, &state.gateway, raw));
    }

    tracing::info!(
        applied = summary.applied,
        no_op = summary.no_op,
        duplicate = summary.duplicate,
        skipped = summary.skipped,
        failed = summary.failed,
        "Notification batch processed"
    );

    (StatusCode::OK, "[accepted]")
}

pub async fn handle_adyen_webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    handle_notification_batch(&state, &body)
}
