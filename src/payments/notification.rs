//! Provider notification payloads and their HMAC signatures.

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;

use crate::crypto::constant_time_eq;
use crate::error::{AppError, Result, msg};

type HmacSha256 = Hmac<Sha256>;

/// Envelope posted to the webhook endpoint.
///
/// Items stay as raw JSON here so that one malformed item does not reject the
/// whole batch; each is parsed with [`NotificationRequestItem::from_value`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEnvelope {
    pub notification_items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NotificationItemWrapper {
    #[serde(rename = "NotificationRequestItem")]
    notification_request_item: NotificationRequestItem,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationAmount {
    pub value: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCode {
    Authorisation,
    Capture,
    CaptureFailed,
    Refund,
    RefundFailed,
    Cancellation,
    CancelOrRefund,
    Chargeback,
    Unknown(String),
}

impl EventCode {
    pub fn as_str(&self) -> &str {
        match self {
            EventCode::Authorisation => "AUTHORISATION",
            EventCode::Capture => "CAPTURE",
            EventCode::CaptureFailed => "CAPTURE_FAILED",
            EventCode::Refund => "REFUND",
            EventCode::RefundFailed => "REFUND_FAILED",
            EventCode::Cancellation => "CANCELLATION",
            EventCode::CancelOrRefund => "CANCEL_OR_REFUND",
            EventCode::Chargeback => "CHARGEBACK",
            EventCode::Unknown(code) => code,
        }
    }
}

impl From<String> for EventCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "AUTHORISATION" => EventCode::Authorisation,
            "CAPTURE" => EventCode::Capture,
            "CAPTURE_FAILED" => EventCode::CaptureFailed,
            "REFUND" => EventCode::Refund,
            "REFUND_FAILED" => EventCode::RefundFailed,
            "CANCELLATION" => EventCode::Cancellation,
            "CANCEL_OR_REFUND" => EventCode::CancelOrRefund,
            "CHARGEBACK" => EventCode::Chargeback,
            _ => EventCode::Unknown(code),
        }
    }
}

impl From<EventCode> for String {
    fn from(code: EventCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider sends `success` as the strings "true"/"false"; accept real booleans too.
fn deserialize_success<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid success flag: {}",
                other
            ))),
        },
    }
}

/// One notification about one payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequestItem {
    pub event_code: EventCode,
    #[serde(deserialize_with = "deserialize_success")]
    pub success: bool,
    pub psp_reference: String,
    #[serde(default)]
    pub original_reference: Option<String>,
    pub merchant_reference: String,
    pub merchant_account_code: String,
    pub amount: NotificationAmount,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub additional_data: HashMap<String, serde_json::Value>,
}

impl NotificationRequestItem {
    /// Parse one `{ "NotificationRequestItem": { ... } }` entry.
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value::<NotificationItemWrapper>(value)
            .map(|wrapper| wrapper.notification_request_item)
    }

    fn additional_str(&self, key: &str) -> Option<&str> {
        self.additional_data.get(key).and_then(|v| v.as_str())
    }

    pub fn hmac_signature(&self) -> Option<&str> {
        self.additional_str("hmacSignature")
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `modification.action` on CANCEL_OR_REFUND tells which of the two happened.
    pub fn modification_action(&self) -> Option<&str> {
        self.additional_str("modification.action")
    }

    /// Ledger key for redelivery detection.
    pub fn event_key(&self) -> String {
        format!("{}:{}:{}", self.event_code, self.psp_reference, self.success)
    }

    /// String the provider signs: the eight fields joined with ':'.
    pub fn signing_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.psp_reference,
            self.original_reference.as_deref().unwrap_or_default(),
            self.merchant_account_code,
            self.merchant_reference,
            self.amount.value,
            self.amount.currency,
            self.event_code,
            self.success
        )
    }
}

/// Base64 HMAC-SHA256 of the item's signing string under a hex-encoded key.
pub fn compute_hmac_signature(item: &NotificationRequestItem, hex_key: &str) -> Result<String> {
    let key = hex::decode(hex_key.trim())
        .map_err(|_| AppError::Internal(msg::INVALID_HMAC_KEY.into()))?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|_| AppError::Internal(msg::INVALID_HMAC_KEY.into()))?;
    mac.update(item.signing_string().as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Check the item's `hmacSignature`. A missing signature never verifies.
pub fn verify_hmac_signature(item: &NotificationRequestItem, hex_key: &str) -> Result<bool> {
    let Some(provided) = item.hmac_signature() else {
        return Ok(false);
    };
    let expected = compute_hmac_signature(item, hex_key)?;
    Ok(constant_time_eq(&expected, provided))
}

/// Payload carried back on the shopper's return redirect.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub result_code: String,
    #[serde(default)]
    pub psp_reference: Option<String>,
}

impl SessionResult {
    /// Decode a base64 (standard or URL-safe) JSON `sessionResult`.
    ///
    /// An unencoded '+' arrives as a space after query decoding, so spaces are restored first.
    pub fn decode(encoded: &str) -> Option<Self> {
        let encoded = encoded.trim().replace(' ', "+");
        let bytes = BASE64
            .decode(&encoded)
            .or_else(|_| URL_SAFE.decode(&encoded))
            .or_else(|_| URL_SAFE_NO_PAD.decode(&encoded))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Authorised and Pending both count as a successful payment.
    pub fn is_success(&self) -> bool {
        matches!(self.result_code.as_str(), "Authorised" | "Pending")
    }

    pub fn psp_reference(&self) -> Option<&str> {
        self.psp_reference.as_deref().filter(|s| !s.is_empty())
    }
}
