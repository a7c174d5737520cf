//! Notification reconciliation: maps provider events onto local orders.
//!
//! Each item in a batch is handled on its own. A bad item is logged and
//! skipped, it never fails its siblings or the batch response.

use axum::http::StatusCode;
use serde_json::Value;

use crate::amount::to_decimal_units;
use crate::checkout::unpayable_order_note;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::id::is_valid_prefixed_id;
use crate::models::Order;
use crate::payments::{EventCode, NotificationRequestItem, verify_hmac_signature};
use crate::store::OrderStore;

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// What happened to one notification item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The order changed or a note was recorded
    Applied,
    /// Valid, but nothing to change (already in the target state, unhandled event)
    NoOp,
    /// Already processed on an earlier delivery
    Duplicate,
    /// Rejected before touching any order
    Skipped(SkipReason),
    /// A store error interrupted processing; redelivery will retry
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    MerchantAccountMismatch,
    InvalidSignature,
    OrderNotFound,
    OtherGateway,
}

/// Outcome counts for one delivered batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub no_op: usize,
    pub duplicate: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Applied => self.applied += 1,
            ItemOutcome::NoOp => self.no_op += 1,
            ItemOutcome::Duplicate => self.duplicate += 1,
            ItemOutcome::Skipped(_) => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

fn signature_ok(gateway: &GatewayConfig, item: &NotificationRequestItem) -> bool {
    let Some(key) = gateway.hmac_key.as_deref() else {
        if gateway.webhook_strict {
            tracing::warn!(
                psp_reference = %item.psp_reference,
                "HMAC key not configured - rejecting notification (strict mode)"
            );
            return false;
        }
        tracing::warn!(
            psp_reference = %item.psp_reference,
            "HMAC key not configured - accepting notification without signature check"
        );
        return true;
    };

    match verify_hmac_signature(item, key) {
        Ok(true) => true,
        Ok(false) => {
            tracing::warn!(
                psp_reference = %item.psp_reference,
                merchant_reference = %item.merchant_reference,
                has_signature = item.hmac_signature().is_some(),
                "HMAC signature verification failed"
            );
            false
        }
        Err(e) => {
            tracing::error!("HMAC verification error: {}", e);
            false
        }
    }
}

/// Order by merchant reference, falling back to the raw order id.
fn resolve_order<S: OrderStore + ?Sized>(store: &S, reference: &str) -> Result<Option<Order>> {
    if let Some(order) = store.find_by_reference(reference)? {
        return Ok(Some(order));
    }
    if !is_valid_prefixed_id(reference) {
        return Ok(None);
    }
    store.find_by_id(reference)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Process one raw `notificationItems` entry.
pub fn process_notification_item<S: OrderStore + ?Sized>(
    store: &S,
    gateway: &GatewayConfig,
    raw: Value,
) -> ItemOutcome {
    let item = match NotificationRequestItem::from_value(raw) {
        Ok(item) => item,
        Err(e) => {
            tracing::warn!("Skipping malformed notification item: {}", e);
            return ItemOutcome::Skipped(SkipReason::Malformed);
        }
    };

    tracing::info!(
        event_code = %item.event_code,
        merchant_reference = %item.merchant_reference,
        psp_reference = %item.psp_reference,
        success = item.success,
        "Processing notification"
    );

    if item.merchant_account_code != gateway.merchant_account {
        tracing::warn!(
            received = %item.merchant_account_code,
            "Merchant account mismatch - skipping notification"
        );
        return ItemOutcome::Skipped(SkipReason::MerchantAccountMismatch);
    }

    if !signature_ok(gateway, &item) {
        return ItemOutcome::Skipped(SkipReason::InvalidSignature);
    }

    let order = match resolve_order(store, &item.merchant_reference) {
        Ok(Some(order)) => order,
        Ok(None) => {
            tracing::warn!(merchant_reference = %item.merchant_reference, "Order not found for notification");
            return ItemOutcome::Skipped(SkipReason::OrderNotFound);
        }
        Err(e) => {
            tracing::error!("DB error resolving order: {}", e);
            return ItemOutcome::Failed;
        }
    };

    if !order.belongs_to(&gateway.gateway_id) {
        tracing::warn!(
            order_id = %order.id,
            payment_method = %order.payment_method_id,
            "Notification ignored - order was not placed with this gateway"
        );
        return ItemOutcome::Skipped(SkipReason::OtherGateway);
    }

    let event_key = item.event_key();
    match store.try_record_notification(&event_key) {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(event_key = %event_key, "Duplicate notification - already processed");
            return ItemOutcome::Duplicate;
        }
        Err(e) => {
            tracing::error!("DB error recording notification: {}", e);
            return ItemOutcome::Failed;
        }
    }

    match apply_notification(store, &order, &item) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(order_id = %order.id, event_key = %event_key, "Failed to apply notification: {}", e);
            if let Err(e) = store.release_notification(&event_key) {
                tracing::error!(event_key = %event_key, "Failed to release notification record: {}", e);
            }
            ItemOutcome::Failed
        }
    }
}

fn note<S: OrderStore + ?Sized>(store: &S, order: &Order, text: &str) -> Result<ItemOutcome> {
    store.append_note(&order.id, text)?;
    Ok(ItemOutcome::Applied)
}

fn apply_notification<S: OrderStore + ?Sized>(
    store: &S,
    order: &Order,
    item: &NotificationRequestItem,
) -> Result<ItemOutcome> {
    let psp = item.psp_reference.as_str();

    match (&item.event_code, item.success) {
        (EventCode::Authorisation, true) => authorise(store, order, psp),
        (EventCode::Authorisation, false) => {
            let reason = non_empty(item.reason.as_deref()).unwrap_or("Unknown");
            if store.mark_failed(&order.id)? {
                note(store, order, &format!("Payment authorisation failed. Reason: {}", reason))
            } else {
                tracing::info!(
                    order_id = %order.id,
                    status = order.status.as_ref(),
                    "Authorisation failure not applied - order cannot move to failed"
                );
                Ok(ItemOutcome::NoOp)
            }
        }
        (EventCode::Capture, true) => {
            note(store, order, &format!("Payment captured via Adyen. PSP Reference: {}", psp))
        }
        (EventCode::Capture, false) | (EventCode::CaptureFailed, _) => {
            note(store, order, &format!("Payment capture failed. PSP Reference: {}", psp))
        }
        (EventCode::Refund, true) => refund_note(store, order, item),
        (EventCode::CancelOrRefund, true) if item.modification_action() == Some("refund") => {
            refund_note(store, order, item)
        }
        (EventCode::Cancellation, true) | (EventCode::CancelOrRefund, true) => {
            if store.mark_cancelled(&order.id)? {
                note(store, order, &format!("Payment cancelled via Adyen. PSP Reference: {}", psp))
            } else {
                tracing::info!(
                    order_id = %order.id,
                    status = order.status.as_ref(),
                    "Cancellation not applied - order cannot be cancelled"
                );
                Ok(ItemOutcome::NoOp)
            }
        }
        (EventCode::Chargeback, _) => note(
            store,
            order,
            &format!(
                "Chargeback received from Adyen. PSP Reference: {}. Please review in your Adyen dashboard.",
                psp
            ),
        ),
        (code, success) => {
            tracing::info!(event_code = %code, success, "Unhandled notification event");
            Ok(ItemOutcome::NoOp)
        }
    }
}

/// Successful authorisation: claim the order or fill in a missing transaction id.
fn authorise<S: OrderStore + ?Sized>(store: &S, order: &Order, psp: &str) -> Result<ItemOutcome> {
    // Re-read right before deciding; the return path may have won meanwhile.
    let mut current = store.find_by_id(&order.id)?.unwrap_or_else(|| order.clone());

    if !current.is_paid() {
        if store.mark_paid(&current.id, Some(psp))? {
            tracing::info!(order_id = %current.id, psp_reference = psp, "Order paid via webhook");
            return note(
                store,
                &current,
                &format!("Adyen payment authorised via webhook. PSP Reference: {}", psp),
            );
        }

        current = store.find_by_id(&order.id)?.unwrap_or(current);
        if current.records_transaction(psp) && !current.is_paid() {
            tracing::debug!(
                order_id = %current.id,
                status = current.status.as_ref(),
                "Late authorisation for the payment already on the order"
            );
            return Ok(ItemOutcome::NoOp);
        }
        if !current.is_paid() {
            tracing::warn!(
                order_id = %current.id,
                status = current.status.as_ref(),
                psp_reference = psp,
                "Authorisation for an order that can no longer be paid"
            );
            return note(store, &current, &unpayable_order_note(Some(psp), current.status));
        }
        tracing::info!(order_id = %current.id, "Order claimed concurrently - checking transaction id");
    }

    if !current.has_transaction_id() && store.backfill_transaction_id(&current.id, psp)? {
        tracing::info!(order_id = %current.id, psp_reference = psp, "Transaction id backfilled from webhook");
        return Ok(ItemOutcome::Applied);
    }

    tracing::debug!(order_id = %current.id, "Order already paid with transaction id - nothing to do");
    Ok(ItemOutcome::NoOp)
}

fn refund_note<S: OrderStore + ?Sized>(
    store: &S,
    order: &Order,
    item: &NotificationRequestItem,
) -> Result<ItemOutcome> {
    let amount = to_decimal_units(item.amount.value, &item.amount.currency);
    note(
        store,
        order,
        &format!(
            "Refund processed via Adyen webhook. Amount: {} {}, PSP Reference: {}",
            amount, item.amount.currency, item.psp_reference
        ),
    )
}
