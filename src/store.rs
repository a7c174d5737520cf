//! Seams between the payment flows and the storefront's order and cart data.
//!
//! Checkout, the return handler and the webhook engine only talk to these
//! traits. `db` implements them over SQLite.

use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::Order;

pub trait Cart {
    fn is_empty(&self) -> bool;
    fn total(&self) -> Decimal;
    /// Remove everything from the cart.
    fn empty(&mut self) -> Result<()>;
}

/// Order persistence as seen by the payment flows.
///
/// Every `mark_*` operation is a guarded transition: it returns `true` only
/// when this call changed the order, so callers attach side effects (notes,
/// emptying the cart) to the winning call only.
pub trait OrderStore {
    fn find_by_reference(&self, reference: &str) -> Result<Option<Order>>;
    fn find_by_id(&self, order_id: &str) -> Result<Option<Order>>;
    fn find_by_session_id(&self, session_id: &str) -> Result<Option<Order>>;

    fn mark_pending(&self, order_id: &str) -> Result<bool>;
    /// Claim the order as paid, recording `transaction_id` unless one exists.
    fn mark_paid(&self, order_id: &str, transaction_id: Option<&str>) -> Result<bool>;
    /// Record the transaction id on an order that has none. Never overwrites.
    fn backfill_transaction_id(&self, order_id: &str, transaction_id: &str) -> Result<bool>;
    fn mark_failed(&self, order_id: &str) -> Result<bool>;
    fn mark_cancelled(&self, order_id: &str) -> Result<bool>;
    fn mark_refunded(&self, order_id: &str) -> Result<bool>;
    /// Move the refunded sum from `expected` to `next` while the order is paid.
    fn update_refunded_total(&self, order_id: &str, expected: Decimal, next: Decimal) -> Result<bool>;

    fn append_note(&self, order_id: &str, note: &str) -> Result<()>;
    fn set_session_id(&self, order_id: &str, session_id: &str) -> Result<()>;
    fn get_security_key(&self, order_id: &str) -> Result<Option<String>>;

    /// Record a notification key. Returns false if it was already recorded.
    fn try_record_notification(&self, event_key: &str) -> Result<bool>;
    fn release_notification(&self, event_key: &str) -> Result<()>;

    fn cart_for(&self, order: &Order) -> Result<Option<Box<dyn Cart + '_>>>;
}
