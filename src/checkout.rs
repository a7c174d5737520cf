//! Session orchestration: turns orders and carts into provider sessions,
//! payments and refunds.
//!
//! Database connections are scoped so none is held across a provider call.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::amount::to_minor_units;
use crate::crypto::verify_nonce;
use crate::db::{AppState, SqliteCart, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::{BillingDetails, Order, OrderStatus};
use crate::payments::{
    Amount, ApiFailure, BillingAddress, PaymentOutcome, PaymentRequest, RefundOutcome,
    SessionRequest, ShopperName,
};
use crate::store::{Cart, OrderStore};
use crate::util::{append_query_params, join_url, truncate_chars};

pub const DEFAULT_COUNTRY: &str = "US";

/// Longest merchant reference the provider accepts.
const MAX_REFERENCE_CHARS: usize = 80;

const AWAITING_PAYMENT_NOTE: &str = "Awaiting Adyen Apple Pay payment";
const SESSION_FAILED_NOTE: &str = "Failed to create Adyen payment session";

const CONNECTION_OK: &str =
    "Connection successful! Your Adyen API credentials are working correctly.";

pub fn payment_completed_note(psp_reference: &str, result_code: &str) -> String {
    format!(
        "Adyen Apple Pay payment completed. PSP Reference: {}, Result: {}",
        psp_reference, result_code
    )
}

/// Return-path success before the provider reported a PSP reference.
pub fn payment_awaiting_reference_note(result_code: &str) -> String {
    format!(
        "Adyen Apple Pay payment completed. Result: {}. PSP Reference pending, it will be recorded from the webhook.",
        result_code
    )
}

/// A payment went through for an order that can no longer take one.
pub fn unpayable_order_note(psp_reference: Option<&str>, status: OrderStatus) -> String {
    format!(
        "Adyen payment authorised but the order is {}. PSP Reference: {}. Review and refund manually.",
        status.as_ref(),
        psp_reference.unwrap_or("unknown")
    )
}

pub fn payment_failed_note(message: &str) -> String {
    format!("Payment failed: {}", message)
}

/// Where a paid order's shopper lands.
pub fn order_received_url(state: &AppState, order: &Order) -> String {
    append_query_params(
        &state.success_page_url,
        &[("order_id", &order.id), ("key", &order.order_key)],
    )
}

/// Refuse to touch orders placed with another payment method.
pub fn ensure_gateway_order(state: &AppState, order: &Order) -> Result<()> {
    if !order.belongs_to(&state.gateway.gateway_id) {
        tracing::warn!(
            order_id = %order.id,
            payment_method = %order.payment_method_id,
            gateway_id = %state.gateway.gateway_id,
            "Order was not placed with this gateway"
        );
        return Err(AppError::Forbidden(msg::WRONG_PAYMENT_METHOD.into()));
    }
    Ok(())
}

/// Only unpaid orders in a payable status may start a new payment.
fn ensure_payable(order: &Order) -> Result<()> {
    if order.is_paid() {
        return Err(AppError::Conflict(msg::ORDER_ALREADY_PAID.into()));
    }
    if !order.is_payable() {
        tracing::warn!(
            order_id = %order.id,
            status = order.status.as_ref(),
            "Payment requested for an order that can no longer be paid"
        );
        return Err(AppError::Conflict(msg::ORDER_NOT_PAYABLE.into()));
    }
    Ok(())
}

fn ensure_available(state: &AppState) -> Result<()> {
    if !state.gateway.is_available() {
        return Err(AppError::Unavailable(msg::GATEWAY_UNAVAILABLE.into()));
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn country_code(billing: &BillingDetails) -> String {
    non_empty(&billing.country)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string())
}

fn shopper_name(billing: &BillingDetails) -> Option<ShopperName> {
    let first = non_empty(&billing.first_name);
    let last = non_empty(&billing.last_name);
    if first.is_none() && last.is_none() {
        return None;
    }
    Some(ShopperName {
        first_name: first.unwrap_or_default().to_string(),
        last_name: last.unwrap_or_default().to_string(),
    })
}

/// The provider rejects partial addresses, so send one only when street, city and country exist.
fn billing_address(billing: &BillingDetails) -> Option<BillingAddress> {
    let street = non_empty(&billing.address_1)?;
    let city = non_empty(&billing.city)?;
    let country = non_empty(&billing.country)?;
    Some(BillingAddress {
        street: street.to_string(),
        house_number_or_name: non_empty(&billing.address_2).unwrap_or_default().to_string(),
        postal_code: non_empty(&billing.postcode).unwrap_or_default().to_string(),
        city: city.to_string(),
        state_or_province: non_empty(&billing.state).unwrap_or_default().to_string(),
        country: country.to_ascii_uppercase(),
    })
}

fn order_amount(order: &Order) -> Result<Amount> {
    Ok(Amount {
        currency: order.currency.clone(),
        value: to_minor_units(order.total, &order.currency)?,
    })
}

fn order_return_url(state: &AppState, order: &Order) -> String {
    append_query_params(
        &join_url(&state.base_url, "adyen/return"),
        &[("order_id", &order.id), ("key", &order.order_key)],
    )
}

/// Load an order this gateway may act on.
fn load_gateway_order<S: OrderStore + ?Sized>(
    store: &S,
    state: &AppState,
    order_id: &str,
) -> Result<Order> {
    let order = store
        .find_by_id(order_id)?
        .or_not_found(msg::ORDER_NOT_FOUND)?;
    ensure_gateway_order(state, &order)?;
    Ok(order)
}

// ============ Hosted checkout ============

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRedirect {
    pub order_id: String,
    pub session_id: String,
    pub redirect_url: String,
}

/// Open a hosted-checkout session for an order and build the shopper redirect.
pub async fn create_checkout_session(state: &AppState, order_id: &str) -> Result<CheckoutRedirect> {
    ensure_available(state)?;

    let (order, request) = {
        let conn = state.db.get()?;
        let order = load_gateway_order(&*conn, state, order_id)?;
        ensure_payable(&order)?;

        if conn.mark_pending(&order.id)? {
            tracing::info!(order_id = %order.id, "Failed order reset to pending for a new attempt");
        }
        conn.append_note(&order.id, AWAITING_PAYMENT_NOTE)?;

        let request = SessionRequest {
            amount: order_amount(&order)?,
            reference: order.reference.clone(),
            return_url: order_return_url(state, &order),
            country_code: country_code(&order.billing),
            shopper_email: non_empty(&order.billing.email).map(str::to_string),
            shopper_name: shopper_name(&order.billing),
            billing_address: billing_address(&order.billing),
        };
        (order, request)
    };

    tracing::info!(
        order_id = %order.id,
        reference = %order.reference,
        total = %order.total,
        currency = %order.currency,
        "Creating hosted checkout session"
    );

    match state.adyen_client().create_session(&request).await {
        Ok(session) => {
            let conn = state.db.get()?;
            conn.set_session_id(&order.id, &session.id)?;

            let redirect_url = append_query_params(
                &join_url(&state.checkout_url, "adyen-redirect/"),
                &[
                    ("sessionId", &session.id),
                    ("sessionData", &session.session_data),
                    ("order_id", &order.id),
                    ("key", &order.order_key),
                ],
            );

            tracing::info!(order_id = %order.id, session_id = %session.id, "Redirecting shopper to hosted checkout");
            Ok(CheckoutRedirect {
                order_id: order.id,
                session_id: session.id,
                redirect_url,
            })
        }
        Err(e) => {
            tracing::error!(order_id = %order.id, "Failed to create payment session: {}", e);
            let conn = state.db.get()?;
            conn.append_note(&order.id, SESSION_FAILED_NOTE)?;
            Err(AppError::BadGateway(msg::PAYMENT_INIT_FAILED.into()))
        }
    }
}

// ============ Cart sessions ============

/// Session data handed to the storefront's Apple Pay button.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSession {
    pub session_id: String,
    pub session_data: String,
    pub client_key: String,
    pub environment: &'static str,
    pub amount: Amount,
    pub country_code: String,
    pub merchant_name: String,
}

/// Merchant reference for a session opened before any order exists.
///
/// `SESSION-{C<customer>|GUEST}[-S<last 8 of session key>]-{unix}`, at most 80 characters.
pub fn session_reference(customer_id: Option<&str>, session_key: Option<&str>, now: i64) -> String {
    let mut parts = Vec::with_capacity(3);

    match customer_id.filter(|c| !c.is_empty()) {
        Some(customer) => parts.push(format!("C{}", customer)),
        None => parts.push("GUEST".to_string()),
    }

    if let Some(key) = session_key.filter(|k| !k.is_empty()) {
        let skip = key.chars().count().saturating_sub(8);
        parts.push(format!("S{}", key.chars().skip(skip).collect::<String>()));
    }

    parts.push(now.to_string());

    let reference = format!("SESSION-{}", parts.join("-"));
    truncate_chars(&reference, MAX_REFERENCE_CHARS).to_string()
}

/// Open a session for a cart (the express button flow, before an order exists).
pub async fn create_cart_session(
    state: &AppState,
    cart_id: &str,
    nonce: &str,
    country: Option<&str>,
) -> Result<GuestSession> {
    if !verify_nonce(&state.nonce_secret, cart_id, nonce) {
        tracing::warn!(cart_id = %cart_id, "Checkout nonce verification failed");
        return Err(AppError::Forbidden(msg::SECURITY_CHECK_FAILED.into()));
    }
    ensure_available(state)?;

    let (record, total) = {
        let conn = state.db.get()?;
        let record = queries::get_cart_by_id(&conn, cart_id)?.or_not_found(msg::CART_NOT_FOUND)?;
        let cart = SqliteCart::new(&conn, record);
        if cart.is_empty() {
            return Err(AppError::BadRequest(msg::CART_EMPTY.into()));
        }
        let total = cart.total();
        (cart.record().clone(), total)
    };

    let country_code = country
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());

    let reference = session_reference(
        record.customer_id.as_deref(),
        record.session_key.as_deref(),
        chrono::Utc::now().timestamp(),
    );

    let request = SessionRequest {
        amount: Amount {
            currency: record.currency.clone(),
            value: to_minor_units(total, &record.currency)?,
        },
        reference,
        return_url: state.checkout_url.clone(),
        country_code,
        shopper_email: None,
        shopper_name: None,
        billing_address: None,
    };

    tracing::info!(
        cart_id = %record.id,
        reference = %request.reference,
        total = %total,
        currency = %record.currency,
        "Creating cart session"
    );

    let session = state
        .adyen_client()
        .create_session(&request)
        .await
        .map_err(|e| {
            tracing::error!(cart_id = %record.id, "Failed to create cart session: {}", e);
            AppError::BadGateway(msg::SESSION_CREATE_FAILED.into())
        })?;

    Ok(GuestSession {
        session_id: session.id,
        session_data: session.session_data,
        client_key: state.gateway.client_key.clone(),
        environment: state.gateway.environment().as_str(),
        amount: request.amount,
        country_code: request.country_code,
        merchant_name: state.gateway.merchant_name.clone(),
    })
}

// ============ Direct payments ============

#[derive(Debug, Clone, Serialize)]
pub struct DirectPaymentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Pay an order with a payment method payload produced by the client SDK.
pub async fn process_direct_payment(
    state: &AppState,
    order_id: &str,
    payment_method: Value,
) -> Result<DirectPaymentResult> {
    ensure_available(state)?;

    let (order, request) = {
        let conn = state.db.get()?;
        let order = load_gateway_order(&*conn, state, order_id)?;
        ensure_payable(&order)?;

        let request = PaymentRequest {
            amount: order_amount(&order)?,
            reference: order.reference.clone(),
            return_url: order_return_url(state, &order),
            shopper_email: non_empty(&order.billing.email).map(str::to_string),
            shopper_name: shopper_name(&order.billing),
            billing_address: billing_address(&order.billing),
            payment_method,
        };
        (order, request)
    };

    let outcome = state.adyen_client().process_payment(&request).await;

    let conn = state.db.get()?;
    match outcome {
        PaymentOutcome::Success {
            psp_reference,
            result_code,
        } => {
            if conn.mark_paid(&order.id, psp_reference.as_deref())? {
                conn.append_note(
                    &order.id,
                    &payment_completed_note(psp_reference.as_deref().unwrap_or_default(), &result_code),
                )?;
                if let Some(mut cart) = conn.cart_for(&order)? {
                    cart.empty()?;
                }
                tracing::info!(order_id = %order.id, result_code = %result_code, "Order paid via direct payment");
            } else {
                let current = conn.find_by_id(&order.id)?.unwrap_or_else(|| order.clone());
                if !current.is_paid() {
                    tracing::warn!(
                        order_id = %order.id,
                        status = current.status.as_ref(),
                        "Payment authorised for an order that left the payable states"
                    );
                    conn.append_note(
                        &order.id,
                        &unpayable_order_note(psp_reference.as_deref(), current.status),
                    )?;
                    return Ok(DirectPaymentResult {
                        success: false,
                        result_code: Some(result_code),
                        redirect_url: None,
                        message: Some(msg::ORDER_NOT_PAYABLE.to_string()),
                    });
                }
                if let Some(psp) = psp_reference.as_deref() {
                    conn.backfill_transaction_id(&order.id, psp)?;
                }
                tracing::info!(order_id = %order.id, "Order was already paid; direct payment result ignored");
            }

            Ok(DirectPaymentResult {
                success: true,
                result_code: Some(result_code),
                redirect_url: Some(order_received_url(state, &order)),
                message: None,
            })
        }
        PaymentOutcome::Failure {
            message,
            result_code,
        } => {
            if conn.mark_failed(&order.id)? {
                conn.append_note(&order.id, &payment_failed_note(&message))?;
            } else {
                tracing::warn!(
                    order_id = %order.id,
                    status = order.status.as_ref(),
                    "Payment failure not applied to order"
                );
            }

            Ok(DirectPaymentResult {
                success: false,
                result_code,
                redirect_url: None,
                message: Some(message),
            })
        }
    }
}

// ============ Refunds ============

#[derive(Debug, Clone, Serialize)]
pub struct RefundReceipt {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub psp_reference: String,
    pub status: OrderStatus,
}

/// Refund part or all of a paid order. `None` refunds whatever is left.
///
/// The refunded sum is reserved before the provider call and released if the
/// provider refuses, so concurrent refunds cannot exceed the order total.
pub async fn refund_order(
    state: &AppState,
    order_id: &str,
    amount: Option<Decimal>,
    reason: Option<&str>,
) -> Result<RefundReceipt> {
    ensure_available(state)?;

    let (order, amount, refunded_after) = {
        let conn = state.db.get()?;
        let order = load_gateway_order(&*conn, state, order_id)?;

        if !order.has_transaction_id() {
            tracing::warn!(order_id = %order.id, "Refund requested for order without transaction id");
            return Err(AppError::BadRequest(msg::TRANSACTION_ID_MISSING.into()));
        }
        if !order.is_paid() {
            tracing::warn!(order_id = %order.id, status = order.status.as_ref(), "Refund requested for unpaid order");
            return Err(AppError::Conflict(msg::ORDER_NOT_REFUNDABLE.into()));
        }

        let amount = amount.unwrap_or_else(|| order.refundable_amount());
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into()));
        }
        if amount > order.refundable_amount() {
            return Err(AppError::BadRequest(msg::REFUND_EXCEEDS_REMAINING.into()));
        }

        let refunded_after = order.refunded_total + amount;
        if !conn.update_refunded_total(&order.id, order.refunded_total, refunded_after)? {
            return Err(AppError::Conflict(msg::REFUND_IN_PROGRESS.into()));
        }
        (order, amount, refunded_after)
    };

    let psp_reference = order.transaction_id.clone().unwrap_or_default();
    let outcome = state
        .adyen_client()
        .process_refund(&psp_reference, amount, &order.currency, reason)
        .await;

    let conn = state.db.get()?;
    match outcome {
        RefundOutcome::Success {
            psp_reference: refund_reference,
        } => {
            conn.append_note(
                &order.id,
                &format!(
                    "Refund of {} {} processed via Adyen. Reference: {}",
                    amount, order.currency, refund_reference
                ),
            )?;

            let mut status = order.status;
            if refunded_after >= order.total && conn.mark_refunded(&order.id)? {
                status = OrderStatus::Refunded;
            }

            tracing::info!(
                order_id = %order.id,
                amount = %amount,
                refunded_total = %refunded_after,
                refund_reference = %refund_reference,
                "Refund accepted"
            );

            Ok(RefundReceipt {
                order_id: order.id,
                amount,
                currency: order.currency,
                psp_reference: refund_reference,
                status,
            })
        }
        RefundOutcome::Failure { message } => {
            tracing::warn!(order_id = %order.id, "Refund failed: {}", message);
            if !conn.update_refunded_total(&order.id, refunded_after, order.refunded_total)? {
                tracing::error!(
                    order_id = %order.id,
                    amount = %amount,
                    "Could not release the refund reservation"
                );
            }
            Err(AppError::BadGateway(message))
        }
    }
}

// ============ Credential check ============

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionCheck {
    pub success: bool,
    pub message: String,
    pub mode: &'static str,
}

/// Verify the configured credentials by opening a throwaway session.
pub async fn test_connection(state: &AppState) -> ConnectionCheck {
    let mode = if state.gateway.environment().is_test() {
        "Test Mode"
    } else {
        "Live Mode"
    };

    if state.gateway.api_key.is_empty() || state.gateway.merchant_account.is_empty() {
        return ConnectionCheck {
            success: false,
            message: msg::CREDENTIALS_MISSING.into(),
            mode,
        };
    }

    let (success, message) = match state.adyen_client().test_connection(&state.base_url).await {
        Ok(_) => (true, CONNECTION_OK.to_string()),
        Err(ApiFailure::Provider(e)) => (
            false,
            format!(
                "Connection failed: {}",
                e.message.as_deref().unwrap_or("unknown provider error")
            ),
        ),
        Err(ApiFailure::Transport(e)) => (false, format!("Connection error: {}", e)),
        Err(ApiFailure::Protocol(_)) => (false, msg::UNEXPECTED_PROVIDER_RESPONSE.to_string()),
    };

    tracing::info!(success, mode, "Provider connection test finished");
    ConnectionCheck {
        success,
        message,
        mode,
    }
}
