use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::amount::to_minor_units;
use crate::config::GatewayConfig;
use crate::error::msg;

use super::redact::{preview, redact_request, redact_response};

/// Timeout applied to every provider call.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

const FALLBACK_FAILURE_MESSAGE: &str = "Payment processing failed. Please try again.";

/// Shared HTTP client for provider calls.
pub fn build_http_client() -> reqwest::Result<Client> {
    Client::builder().timeout(PROVIDER_TIMEOUT).build()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Amount {
    pub currency: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopperName {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    pub street: String,
    pub house_number_or_name: String,
    pub postal_code: String,
    pub city: String,
    pub state_or_province: String,
    pub country: String,
}

/// Body of a hosted-checkout session request, minus the merchant account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub amount: Amount,
    pub reference: String,
    pub return_url: String,
    pub country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopper_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopper_name: Option<ShopperName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload<'a> {
    merchant_account: &'a str,
    #[serde(flatten)]
    request: &'a SessionRequest,
    allowed_payment_methods: [&'static str; 1],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub id: String,
    pub session_data: String,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Error payload returned by the provider API.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({})",
            self.message.as_deref().unwrap_or("unknown provider error"),
            self.error_code.as_deref().unwrap_or("no error code")
        )
    }
}

/// Why a provider call produced no usable result.
#[derive(Debug, Error)]
pub enum ApiFailure {
    /// Network, DNS, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(String),
    /// The provider answered with something that is not the expected JSON
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The provider answered with an error payload
    #[error("provider error: {0}")]
    Provider(ProviderError),
}

/// Direct payment request (client-side SDK flow).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Amount,
    pub reference: String,
    pub return_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopper_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopper_name: Option<ShopperName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
    /// Opaque payment method payload from the client SDK
    pub payment_method: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentPayload<'a> {
    merchant_account: &'a str,
    #[serde(flatten)]
    request: &'a PaymentRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    result_code: Option<String>,
    psp_reference: Option<String>,
    refusal_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success {
        psp_reference: Option<String>,
        result_code: String,
    },
    Failure {
        message: String,
        result_code: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundPayload<'a> {
    amount: Amount,
    merchant_account: &'a str,
    reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    shopper_statement: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundResponse {
    status: Option<String>,
    psp_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    Success { psp_reference: String },
    Failure { message: String },
}

/// Longest shopper statement the provider accepts on a refund.
const SHOPPER_STATEMENT_MAX_CHARS: usize = 25;

/// Shopper-facing message for a payment that was not authorised.
pub fn payment_failure_message(result_code: &str, refusal_reason: Option<&str>) -> String {
    if let Some(reason) = refusal_reason.filter(|r| !r.is_empty()) {
        return reason.to_string();
    }
    match result_code {
        "Refused" => "Payment was refused. Please try another payment method.".to_string(),
        "Cancelled" => "Payment was cancelled.".to_string(),
        "Error" => "An error occurred during payment processing.".to_string(),
        other => format!("Payment status: {}", other),
    }
}

#[derive(Debug, Clone)]
pub struct AdyenClient {
    client: Client,
    api_key: String,
    merchant_account: String,
    base_url: String,
}

impl AdyenClient {
    pub fn new(config: &GatewayConfig, client: Client) -> Self {
        let base_url = config.api_base_url();
        tracing::debug!(base_url = %base_url, "Adyen client initialized");
        Self {
            client,
            api_key: config.api_key.clone(),
            merchant_account: config.merchant_account.clone(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON payload and return the HTTP status with the parsed body.
    async fn post_json(&self, path: &str, payload: &Value) -> Result<(StatusCode, Value), ApiFailure> {
        let endpoint = format!("{}{}", self.base_url, path);
        tracing::debug!(
            endpoint = %endpoint,
            api_key_len = self.api_key.len(),
            payload = %redact_request(payload),
            "Adyen request"
        );

        let started = Instant::now();
        let response = self
            .client
            .post(&endpoint)
            .header("X-API-Key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(endpoint = %endpoint, "Adyen request failed: {}", e);
                ApiFailure::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(endpoint = %endpoint, "Failed to read Adyen response: {}", e);
            ApiFailure::Transport(e.to_string())
        })?;

        tracing::debug!(
            endpoint = %endpoint,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            body_len = body.len(),
            "Adyen response received"
        );

        let data: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                status = status.as_u16(),
                raw = preview(&body),
                "Adyen response is not valid JSON: {}",
                e
            );
            ApiFailure::Protocol(format!("invalid JSON response (HTTP {}): {}", status, e))
        })?;

        tracing::debug!(response = %redact_response(&data), "Adyen response parsed");

        if let Some(code) = data.get("errorCode").and_then(Value::as_str) {
            let message = data.get("message").and_then(Value::as_str).unwrap_or_default();
            let error_type = data.get("errorType").and_then(Value::as_str).unwrap_or_default();
            tracing::warn!(
                error_code = code,
                message,
                error_type,
                "Adyen returned an error"
            );
        }

        Ok((status, data))
    }

    fn provider_error(status: StatusCode, data: Value) -> ApiFailure {
        let mut error: ProviderError = serde_json::from_value(data).unwrap_or_default();
        error.status.get_or_insert(status.as_u16());
        ApiFailure::Provider(error)
    }

    /// Create a hosted-checkout session.
    pub async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession, ApiFailure> {
        tracing::info!(
            reference = %request.reference,
            amount = request.amount.value,
            currency = %request.amount.currency,
            country = %request.country_code,
            "Creating Adyen session"
        );

        let payload = serde_json::to_value(SessionPayload {
            merchant_account: &self.merchant_account,
            request,
            allowed_payment_methods: ["applepay"],
        })
        .map_err(|e| ApiFailure::Protocol(format!("failed to encode session request: {}", e)))?;

        let (status, data) = self.post_json("/sessions", &payload).await?;

        let has_session = data.get("id").is_some_and(Value::is_string)
            && data.get("sessionData").is_some_and(Value::is_string);
        if has_session {
            let session: CreatedSession = serde_json::from_value(data)
                .map_err(|e| ApiFailure::Protocol(format!("invalid session response: {}", e)))?;
            tracing::info!(session_id = %session.id, "Adyen session created");
            return Ok(session);
        }

        if !status.is_success() || data.get("errorCode").is_some() || data.get("message").is_some() {
            return Err(Self::provider_error(status, data));
        }

        tracing::error!("Adyen session response is missing id or sessionData");
        Err(ApiFailure::Protocol(
            "session response is missing id or sessionData".into(),
        ))
    }

    /// Submit a payment with an SDK-provided payment method.
    pub async fn process_payment(&self, request: &PaymentRequest) -> PaymentOutcome {
        let method = request
            .payment_method
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(
            reference = %request.reference,
            amount = request.amount.value,
            currency = %request.amount.currency,
            method,
            "Processing Adyen payment"
        );

        let payload = match serde_json::to_value(PaymentPayload {
            merchant_account: &self.merchant_account,
            request,
        }) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Failed to encode payment request: {}", e);
                return PaymentOutcome::Failure {
                    message: FALLBACK_FAILURE_MESSAGE.into(),
                    result_code: None,
                };
            }
        };

        let data = match self.post_json("/payments", &payload).await {
            Ok((_, data)) => data,
            Err(e) => {
                tracing::error!("Adyen payment call failed: {}", e);
                return PaymentOutcome::Failure {
                    message: FALLBACK_FAILURE_MESSAGE.into(),
                    result_code: None,
                };
            }
        };

        let response: PaymentResponse = match serde_json::from_value(data) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Unexpected Adyen payment response: {}", e);
                return PaymentOutcome::Failure {
                    message: FALLBACK_FAILURE_MESSAGE.into(),
                    result_code: None,
                };
            }
        };

        let Some(result_code) = response.result_code else {
            tracing::error!("Adyen payment response has no resultCode");
            return PaymentOutcome::Failure {
                message: FALLBACK_FAILURE_MESSAGE.into(),
                result_code: None,
            };
        };

        match result_code.as_str() {
            "Authorised" | "Pending" => {
                tracing::info!(
                    result_code = %result_code,
                    psp_reference = response.psp_reference.as_deref().unwrap_or_default(),
                    "Adyen payment accepted"
                );
                PaymentOutcome::Success {
                    psp_reference: response.psp_reference,
                    result_code,
                }
            }
            _ => {
                let message =
                    payment_failure_message(&result_code, response.refusal_reason.as_deref());
                tracing::warn!(
                    result_code = %result_code,
                    refusal_reason = response.refusal_reason.as_deref().unwrap_or_default(),
                    "Adyen payment not authorised"
                );
                PaymentOutcome::Failure {
                    message,
                    result_code: Some(result_code),
                }
            }
        }
    }

    /// Refund (part of) a captured payment.
    pub async fn process_refund(
        &self,
        psp_reference: &str,
        amount: Decimal,
        currency: &str,
        reason: Option<&str>,
    ) -> RefundOutcome {
        tracing::info!(
            psp_reference = psp_reference,
            amount = %amount,
            currency = currency,
            "Processing Adyen refund"
        );

        let value = match to_minor_units(amount, currency) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Refund amount cannot be encoded: {}", e);
                return RefundOutcome::Failure {
                    message: msg::REFUND_FAILED.into(),
                };
            }
        };

        let payload = RefundPayload {
            amount: Amount {
                currency: currency.to_string(),
                value,
            },
            merchant_account: &self.merchant_account,
            reference: format!("Refund-{}", chrono::Utc::now().timestamp()),
            shopper_statement: reason
                .filter(|r| !r.is_empty())
                .map(|r| r.chars().take(SHOPPER_STATEMENT_MAX_CHARS).collect()),
        };

        let payload = match serde_json::to_value(payload) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Failed to encode refund request: {}", e);
                return RefundOutcome::Failure {
                    message: msg::REFUND_FAILED.into(),
                };
            }
        };

        let path = format!("/payments/{}/refunds", urlencoding::encode(psp_reference));
        let response = match self.post_json(&path, &payload).await {
            Ok((_, data)) => serde_json::from_value::<RefundResponse>(data).ok(),
            Err(e) => {
                tracing::error!("Adyen refund call failed: {}", e);
                None
            }
        };

        match response {
            Some(RefundResponse {
                status: Some(status),
                psp_reference: Some(refund_psp),
            }) if status == "received" => {
                tracing::info!(refund_psp_reference = %refund_psp, "Adyen refund accepted");
                RefundOutcome::Success {
                    psp_reference: refund_psp,
                }
            }
            Some(RefundResponse { status, .. }) => {
                tracing::warn!(status = ?status, "Unexpected Adyen refund status");
                RefundOutcome::Failure {
                    message: msg::REFUND_FAILED.into(),
                }
            }
            None => RefundOutcome::Failure {
                message: msg::REFUND_FAILED.into(),
            },
        }
    }

    /// Verify credentials by opening a throwaway EUR 10.00 session.
    pub async fn test_connection(&self, return_url: &str) -> Result<CreatedSession, ApiFailure> {
        let request = SessionRequest {
            amount: Amount {
                currency: "EUR".into(),
                value: 1000,
            },
            reference: format!("TEST-{}", chrono::Utc::now().timestamp()),
            return_url: return_url.to_string(),
            country_code: "DE".into(),
            shopper_email: None,
            shopper_name: None,
            billing_address: None,
        };
        self.create_session(&request).await
    }
}
