use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::crypto::constant_time_eq;
use crate::db::AppState;
use crate::util::extract_bearer_token;

/// Require `Authorization: Bearer <PAYBRIDGE_ADMIN_API_KEY>`.
///
/// Without a configured key the admin endpoints are disabled outright.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        tracing::warn!("Admin request rejected - PAYBRIDGE_ADMIN_API_KEY not configured");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let token = extract_bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    if !constant_time_eq(expected, token) {
        tracing::debug!("Admin request rejected - bad bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
