//! Batch handling: one bad item never fails its siblings or the response.

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

/// Flip one character of the item's signature.
fn corrupt_signature(mut item: serde_json::Value) -> serde_json::Value {
    let signature = item["NotificationRequestItem"]["additionalData"]["hmacSignature"]
        .as_str()
        .unwrap()
        .to_string();
    let mut chars: Vec<char> = signature.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    item["NotificationRequestItem"]["additionalData"]["hmacSignature"] =
        json!(chars.into_iter().collect::<String>());
    item
}

#[tokio::test]
async fn test_bad_signature_skips_only_that_item() {
    let state = create_test_app_state();
    let (tampered, valid) = {
        let conn = state.db.get().unwrap();
        (
            create_test_order(&conn, "REF-300", dec!(49.99)),
            create_test_order(&conn, "REF-301", dec!(15.00)),
        )
    };

    let body = envelope(vec![
        corrupt_signature(signed_notification(
            "AUTHORISATION",
            true,
            "PSP-300",
            "REF-300",
            4999,
            "EUR",
        )),
        signed_notification("AUTHORISATION", true, "PSP-301", "REF-301", 1500, "EUR"),
    ]);

    let response = webhook_app(state.clone())
        .oneshot(webhook_request(body, Some(&webhook_auth_header())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "[accepted]");

    assert_eq!(get_order(&state, &tampered.id).status, OrderStatus::Pending);
    assert!(get_order(&state, &tampered.id).transaction_id.is_none());
    assert_eq!(get_order(&state, &valid.id).status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_signature_over_other_amount_is_rejected() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "REF-302", dec!(49.99))
    };

    let mut item = signed_notification("AUTHORISATION", true, "PSP-302", "REF-302", 4999, "EUR");
    item["NotificationRequestItem"]["amount"]["value"] = json!(1);

    webhook_app(state.clone())
        .oneshot(webhook_request(envelope(vec![item]), Some(&webhook_auth_header())))
        .await
        .unwrap();

    assert_eq!(get_order(&state, &order.id).status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_partial_batch_applies_valid_items() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "REF-303", dec!(49.99))
    };

    let mut other_merchant =
        notification("AUTHORISATION", true, "PSP-MM", "REF-303", 4999, "EUR");
    other_merchant["NotificationRequestItem"]["merchantAccountCode"] = json!("SomeoneElse");

    let body = envelope(vec![
        json!({ "NotificationRequestItem": { "eventCode": "AUTHORISATION" } }),
        sign(other_merchant),
        signed_notification("AUTHORISATION", true, "PSP-303", "REF-303", 4999, "EUR"),
    ]);

    let response = webhook_app(state.clone())
        .oneshot(webhook_request(body, Some(&webhook_auth_header())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let order = get_order(&state, &order.id);
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.transaction_id.as_deref(), Some("PSP-303"));
    assert_eq!(note_texts(&state, &order.id).len(), 1);
}

#[tokio::test]
async fn test_unknown_order_is_acknowledged() {
    let state = create_test_app_state();

    let response = webhook_app(state)
        .oneshot(webhook_request(
            envelope(vec![signed_notification(
                "AUTHORISATION",
                true,
                "PSP-404",
                "REF-DOES-NOT-EXIST",
                100,
                "EUR",
            )]),
            Some(&webhook_auth_header()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "[accepted]");
}

#[tokio::test]
async fn test_empty_batch_is_accepted() {
    let state = create_test_app_state();

    let response = webhook_app(state)
        .oneshot(webhook_request(envelope(vec![]), Some(&webhook_auth_header())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_envelope_returns_400() {
    let state = create_test_app_state();

    for body in ["{not json", r#"{"live":"false"}"#, r#"{"notificationItems":"nope"}"#] {
        let response = webhook_app(state.clone())
            .oneshot(webhook_request(body.to_string(), Some(&webhook_auth_header())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(body_text(response).await, "Invalid notification format");
    }
}
