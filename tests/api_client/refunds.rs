//! Refund requests and their outcomes.

use mockito::Matcher;
use paybridge::payments::{AdyenClient, RefundOutcome};
use rust_decimal_macros::dec;
use serde_json::json;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn client_for(url: &str) -> AdyenClient {
    let mut gateway = test_gateway_config();
    gateway.api_base_url = Some(url.to_string());
    AdyenClient::new(&gateway, reqwest::Client::new())
}

#[tokio::test]
async fn test_refund_received() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/payments/PSP-1300/refunds")
        .match_header("x-api-key", TEST_API_KEY)
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "merchantAccount": TEST_MERCHANT,
                "amount": { "currency": "EUR", "value": 1250 }
            })),
            Matcher::Regex(r#""reference":"Refund-\d+""#.to_string()),
        ]))
        .with_status(201)
        .with_body(json!({ "status": "received", "pspReference": "RF-1300" }).to_string())
        .create_async()
        .await;

    let outcome = client_for(&server.url())
        .process_refund("PSP-1300", dec!(12.50), "EUR", None)
        .await;

    assert_eq!(
        outcome,
        RefundOutcome::Success {
            psp_reference: "RF-1300".into()
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_shopper_statement_is_truncated() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/payments/PSP-1301/refunds")
        .match_body(Matcher::PartialJson(json!({
            "shopperStatement": "Customer changed their mi"
        })))
        .with_status(201)
        .with_body(json!({ "status": "received", "pspReference": "RF-1301" }).to_string())
        .create_async()
        .await;

    client_for(&server.url())
        .process_refund(
            "PSP-1301",
            dec!(5.00),
            "EUR",
            Some("Customer changed their mind about the colour"),
        )
        .await;

    mock.assert_async().await;
}

#[tokio::test]
async fn test_zero_decimal_refund_amount() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/payments/PSP-1302/refunds")
        .match_body(Matcher::PartialJson(json!({
            "amount": { "currency": "JPY", "value": 1500 }
        })))
        .with_status(201)
        .with_body(json!({ "status": "received", "pspReference": "RF-1302" }).to_string())
        .create_async()
        .await;

    let outcome = client_for(&server.url())
        .process_refund("PSP-1302", dec!(1500), "JPY", None)
        .await;

    assert!(matches!(outcome, RefundOutcome::Success { .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unexpected_status_is_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/payments/PSP-1303/refunds")
        .with_status(200)
        .with_body(json!({ "status": "pending", "pspReference": "RF-1303" }).to_string())
        .create_async()
        .await;

    let outcome = client_for(&server.url())
        .process_refund("PSP-1303", dec!(1.00), "EUR", None)
        .await;

    assert_eq!(
        outcome,
        RefundOutcome::Failure {
            message: "Refund processing failed.".into()
        }
    );
}

#[tokio::test]
async fn test_transport_failure_is_failure() {
    let outcome = client_for(UNREACHABLE_PROVIDER)
        .process_refund("PSP-1304", dec!(1.00), "EUR", None)
        .await;

    assert!(matches!(outcome, RefundOutcome::Failure { .. }));
}
