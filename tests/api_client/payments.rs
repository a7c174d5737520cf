//! Direct payment outcomes.

use paybridge::payments::{AdyenClient, Amount, PaymentOutcome, PaymentRequest};
use serde_json::json;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn client_for(url: &str) -> AdyenClient {
    let mut gateway = test_gateway_config();
    gateway.api_base_url = Some(url.to_string());
    AdyenClient::new(&gateway, reqwest::Client::new())
}

fn payment_request() -> PaymentRequest {
    PaymentRequest {
        amount: Amount {
            currency: "USD".into(),
            value: 2599,
        },
        reference: "REF-1200".into(),
        return_url: "https://pay.shop.test/adyen/return".into(),
        shopper_email: None,
        shopper_name: None,
        billing_address: None,
        payment_method: json!({ "type": "applepay", "applePayToken": "tok" }),
    }
}

async fn outcome_for(body: serde_json::Value) -> PaymentOutcome {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/payments")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    client_for(&server.url()).process_payment(&payment_request()).await
}

#[tokio::test]
async fn test_authorised() {
    assert_eq!(
        outcome_for(json!({ "resultCode": "Authorised", "pspReference": "PSP-1" })).await,
        PaymentOutcome::Success {
            psp_reference: Some("PSP-1".into()),
            result_code: "Authorised".into(),
        }
    );
}

#[tokio::test]
async fn test_pending_counts_as_success() {
    assert_eq!(
        outcome_for(json!({ "resultCode": "Pending" })).await,
        PaymentOutcome::Success {
            psp_reference: None,
            result_code: "Pending".into(),
        }
    );
}

#[tokio::test]
async fn test_refused_uses_refusal_reason() {
    assert_eq!(
        outcome_for(json!({
            "resultCode": "Refused",
            "pspReference": "PSP-2",
            "refusalReason": "Not enough balance"
        }))
        .await,
        PaymentOutcome::Failure {
            message: "Not enough balance".into(),
            result_code: Some("Refused".into()),
        }
    );
}

#[tokio::test]
async fn test_redirect_shopper_is_not_success() {
    assert_eq!(
        outcome_for(json!({ "resultCode": "RedirectShopper", "action": {} })).await,
        PaymentOutcome::Failure {
            message: "Payment status: RedirectShopper".into(),
            result_code: Some("RedirectShopper".into()),
        }
    );
}

#[tokio::test]
async fn test_missing_result_code() {
    assert_eq!(
        outcome_for(json!({ "pspReference": "PSP-3" })).await,
        PaymentOutcome::Failure {
            message: "Payment processing failed. Please try again.".into(),
            result_code: None,
        }
    );
}

#[tokio::test]
async fn test_transport_failure() {
    let outcome = client_for(UNREACHABLE_PROVIDER)
        .process_payment(&payment_request())
        .await;

    assert_eq!(
        outcome,
        PaymentOutcome::Failure {
            message: "Payment processing failed. Please try again.".into(),
            result_code: None,
        }
    );
}
