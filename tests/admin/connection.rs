//! Tests for POST /admin/test-connection.

use axum::http::StatusCode;
use mockito::Matcher;
use serde_json::json;
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

async fn check(state: AppState) -> serde_json::Value {
    let response = admin_app(state)
        .oneshot(admin_post("/admin/test-connection", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_connection_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/sessions")
        .match_header("x-api-key", TEST_API_KEY)
        .match_body(Matcher::PartialJson(json!({
            "merchantAccount": TEST_MERCHANT,
            "amount": { "value": 1000, "currency": "EUR" },
            "countryCode": "DE",
            "returnUrl": BASE_URL
        })))
        .with_status(201)
        .with_body(json!({ "id": "CSTEST", "sessionData": "sd" }).to_string())
        .create_async()
        .await;

    let json = check(create_test_app_state_for_provider(&server.url())).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["mode"], "Test Mode");
    assert_eq!(
        json["message"],
        "Connection successful! Your Adyen API credentials are working correctly."
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_provider_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sessions")
        .with_status(401)
        .with_body(
            json!({
                "status": 401,
                "errorCode": "000",
                "message": "HTTP Status Response - Unauthorized",
                "errorType": "security"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let json = check(create_test_app_state_for_provider(&server.url())).await;

    assert_eq!(json["success"], false);
    assert_eq!(
        json["message"],
        "Connection failed: HTTP Status Response - Unauthorized"
    );
}

#[tokio::test]
async fn test_connection_non_json_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/sessions")
        .with_status(500)
        .with_header("content-type", "text/html")
        .with_body("<html><body>Internal Server Error</body></html>")
        .create_async()
        .await;

    let json = check(create_test_app_state_for_provider(&server.url())).await;

    assert_eq!(json["success"], false);
    assert_eq!(
        json["message"],
        "Unexpected response from Adyen API. Please check your credentials."
    );
}

#[tokio::test]
async fn test_connection_transport_error() {
    let json = check(create_test_app_state()).await;

    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().starts_with("Connection error: "));
}

#[tokio::test]
async fn test_connection_missing_credentials() {
    let mut gateway = test_gateway_config();
    gateway.api_key = String::new();

    let json = check(create_test_app_state_with(gateway)).await;

    assert_eq!(json["success"], false);
    assert_eq!(
        json["message"],
        "API credentials not configured. Please configure your API Key and Merchant Account first."
    );
}

#[tokio::test]
async fn test_connection_reports_live_mode() {
    let mut gateway = test_gateway_config();
    gateway.merchant_account = String::new();
    gateway.environment = Some(Environment::Live {
        url_prefix: Some("1797a841fbb37ca7-AdyenDemo".to_string()),
    });

    let json = check(create_test_app_state_with(gateway)).await;

    assert_eq!(json["mode"], "Live Mode");
    assert_eq!(json["success"], false);
}
