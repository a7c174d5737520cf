//! Tests for POST /checkout/orders/{order_id}/payments, the client-SDK
//! payment flow.

use axum::http::StatusCode;
use mockito::Matcher;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn apple_pay_method() -> Value {
    json!({ "type": "applepay", "applePayToken": "eyJ2ZXJzaW9uIjoiRUNfdjEifQ==" })
}

fn order_with_cart(state: &AppState, reference: &str) -> (Order, CartRecord) {
    let conn = state.db.get().unwrap();
    let cart = create_test_cart(&conn, dec!(49.99), 1);
    let order = create_test_order_with(
        &conn,
        reference,
        dec!(49.99),
        "EUR",
        TEST_GATEWAY_ID,
        Some(&cart.id),
    );
    (order, cart)
}

#[tokio::test]
async fn test_authorised_payment_marks_order_paid() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/payments")
        .match_header("x-api-key", TEST_API_KEY)
        .match_body(Matcher::PartialJson(json!({
            "merchantAccount": TEST_MERCHANT,
            "reference": "REF-800",
            "amount": { "value": 4999, "currency": "EUR" },
            "paymentMethod": { "type": "applepay" }
        })))
        .with_status(200)
        .with_body(json!({ "resultCode": "Authorised", "pspReference": "PSP-800" }).to_string())
        .create_async()
        .await;

    let state = create_test_app_state_for_provider(&server.url());
    let (order, cart) = order_with_cart(&state, "REF-800");

    let response = public_app(state.clone())
        .oneshot(post_json(
            &format!("/checkout/orders/{}/payments", order.id),
            &json!({ "paymentMethod": apple_pay_method() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["result_code"], "Authorised");
    assert!(json["redirect_url"].as_str().unwrap().starts_with(SUCCESS_URL));
    assert!(json.get("message").is_none());

    mock.assert_async().await;

    let paid = get_order(&state, &order.id);
    assert_eq!(paid.status, OrderStatus::Processing);
    assert_eq!(paid.transaction_id.as_deref(), Some("PSP-800"));
    assert_eq!(
        note_texts(&state, &order.id),
        vec!["Adyen Apple Pay payment completed. PSP Reference: PSP-800, Result: Authorised"]
    );
    assert_eq!(get_cart(&state, &cart.id).item_count, 0);
}

#[tokio::test]
async fn test_refused_payment_marks_order_failed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/payments")
        .with_status(200)
        .with_body(
            json!({
                "resultCode": "Refused",
                "pspReference": "PSP-801",
                "refusalReason": "CVC Declined"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let state = create_test_app_state_for_provider(&server.url());
    let (order, cart) = order_with_cart(&state, "REF-801");

    let response = public_app(state.clone())
        .oneshot(post_json(
            &format!("/checkout/orders/{}/payments", order.id),
            &json!({ "payment_method": apple_pay_method() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["result_code"], "Refused");
    assert_eq!(json["message"], "CVC Declined");

    let failed = get_order(&state, &order.id);
    assert_eq!(failed.status, OrderStatus::Failed);
    assert!(failed.transaction_id.is_none());
    assert_eq!(note_texts(&state, &order.id), vec!["Payment failed: CVC Declined"]);
    assert_eq!(get_cart(&state, &cart.id).item_count, 1);
}

#[tokio::test]
async fn test_unreachable_provider_fails_payment() {
    let state = create_test_app_state();
    let (order, _) = order_with_cart(&state, "REF-802");

    let response = public_app(state.clone())
        .oneshot(post_json(
            &format!("/checkout/orders/{}/payments", order.id),
            &json!({ "paymentMethod": apple_pay_method() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Payment processing failed. Please try again.");
    assert!(json.get("result_code").is_none());
    assert_eq!(get_order(&state, &order.id).status, OrderStatus::Failed);
}

#[tokio::test]
async fn test_payment_method_must_be_object() {
    let state = create_test_app_state();
    let (order, _) = order_with_cart(&state, "REF-803");

    let response = public_app(state.clone())
        .oneshot(post_json(
            &format!("/checkout/orders/{}/payments", order.id),
            &json!({ "paymentMethod": "applepay" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get_order(&state, &order.id).status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_paid_order_cannot_be_paid_again() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/payments").expect(0).create_async().await;

    let state = create_test_app_state_for_provider(&server.url());
    let (order, _) = order_with_cart(&state, "REF-804");
    {
        let conn = state.db.get().unwrap();
        queries::mark_order_paid(&conn, &order.id, Some("PSP-804")).unwrap();
    }

    let response = public_app(state)
        .oneshot(post_json(
            &format!("/checkout/orders/{}/payments", order.id),
            &json!({ "paymentMethod": apple_pay_method() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cancelled_order_cannot_be_paid() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/payments").expect(0).create_async().await;

    let state = create_test_app_state_for_provider(&server.url());
    let (order, cart) = order_with_cart(&state, "REF-805");
    {
        let conn = state.db.get().unwrap();
        queries::mark_order_cancelled(&conn, &order.id).unwrap();
    }

    let response = public_app(state.clone())
        .oneshot(post_json(
            &format!("/checkout/orders/{}/payments", order.id),
            &json!({ "paymentMethod": apple_pay_method() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    mock.assert_async().await;
    assert_eq!(get_order(&state, &order.id).status, OrderStatus::Cancelled);
    assert_eq!(get_cart(&state, &cart.id).item_count, 1);
}
