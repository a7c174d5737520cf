//! Log-safe copies of provider payloads.

use serde_json::Value;

/// Longest raw body excerpt written to the log when a response is not JSON.
pub const RAW_PREVIEW_CHARS: usize = 500;

/// Copy of a request payload with wallet tokens masked.
pub fn redact_request(payload: &Value) -> Value {
    let mut copy = payload.clone();
    if let Some(method) = copy.get_mut("paymentMethod").and_then(Value::as_object_mut) {
        for (key, value) in method.iter_mut() {
            if key.ends_with("Token") || key.ends_with("token") {
                *value = Value::String("[REDACTED]".into());
            }
        }
    }
    copy
}

/// Copy of a response payload with the opaque session blob replaced by its length.
pub fn redact_response(payload: &Value) -> Value {
    let mut copy = payload.clone();
    if let Some(data) = copy.get_mut("sessionData") {
        let len = data.as_str().map(|s| s.chars().count()).unwrap_or(0);
        *data = Value::String(format!("[REDACTED - {} chars]", len));
    }
    copy
}

/// First `RAW_PREVIEW_CHARS` characters of a body, cut on a char boundary.
pub fn preview(body: &str) -> &str {
    match body.char_indices().nth(RAW_PREVIEW_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
