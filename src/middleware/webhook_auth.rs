use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::GatewayConfig;
use crate::crypto::constant_time_eq;
use crate::db::AppState;

const REALM: &str = "Basic realm=\"Adyen Webhook\"";

/// Decode `Authorization: Basic base64(user:pass)`.
pub fn extract_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Whether a webhook request may proceed to body parsing.
pub fn webhook_request_authorized(gateway: &GatewayConfig, headers: &HeaderMap) -> bool {
    let Some((username, password)) = gateway.webhook_credentials() else {
        if gateway.webhook_strict {
            tracing::warn!("Webhook rejected - Basic Auth credentials not configured (strict mode)");
            return false;
        }
        tracing::warn!("Webhook Basic Auth not configured - accepting unauthenticated notification");
        return true;
    };

    let Some((user, pass)) = extract_basic_credentials(headers) else {
        tracing::warn!("Webhook rejected - missing or malformed Basic Auth header");
        return false;
    };

    // Evaluate both so a username mismatch takes as long as a password mismatch.
    let user_ok = constant_time_eq(username, &user);
    let pass_ok = constant_time_eq(password, &pass);
    if !(user_ok && pass_ok) {
        tracing::warn!("Webhook rejected - Basic Auth credentials do not match");
        return false;
    }
    true
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(REALM))],
        "Unauthorized",
    )
        .into_response()
}

/// Basic Auth gate for the notification endpoint. Runs before the body is read.
pub async fn webhook_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !webhook_request_authorized(&state.gateway, request.headers()) {
        return unauthorized();
    }
    next.run(request).await
}
