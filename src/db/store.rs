use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{CartRecord, Order};
use crate::store::{Cart, OrderStore};

use super::queries;

/// A cart row bound to the connection it was loaded from.
pub struct SqliteCart<'c> {
    conn: &'c Connection,
    record: CartRecord,
}

impl<'c> SqliteCart<'c> {
    pub fn new(conn: &'c Connection, record: CartRecord) -> Self {
        Self { conn, record }
    }

    pub fn record(&self) -> &CartRecord {
        &self.record
    }
}

impl Cart for SqliteCart<'_> {
    fn is_empty(&self) -> bool {
        self.record.item_count <= 0
    }

    fn total(&self) -> Decimal {
        self.record.total
    }

    fn empty(&mut self) -> Result<()> {
        queries::empty_cart(self.conn, &self.record.id)?;
        self.record.item_count = 0;
        self.record.total = Decimal::ZERO;
        Ok(())
    }
}

impl OrderStore for Connection {
    fn find_by_reference(&self, reference: &str) -> Result<Option<Order>> {
        queries::get_order_by_reference(self, reference)
    }

    fn find_by_id(&self, order_id: &str) -> Result<Option<Order>> {
        queries::get_order_by_id(self, order_id)
    }

    fn find_by_session_id(&self, session_id: &str) -> Result<Option<Order>> {
        queries::get_order_by_session_id(self, session_id)
    }

    fn mark_pending(&self, order_id: &str) -> Result<bool> {
        queries::mark_order_pending(self, order_id)
    }

    fn mark_paid(&self, order_id: &str, transaction_id: Option<&str>) -> Result<bool> {
        queries::mark_order_paid(self, order_id, transaction_id)
    }

    fn backfill_transaction_id(&self, order_id: &str, transaction_id: &str) -> Result<bool> {
        queries::backfill_transaction_id(self, order_id, transaction_id)
    }

    fn mark_failed(&self, order_id: &str) -> Result<bool> {
        queries::mark_order_failed(self, order_id)
    }

    fn mark_cancelled(&self, order_id: &str) -> Result<bool> {
        queries::mark_order_cancelled(self, order_id)
    }

    fn mark_refunded(&self, order_id: &str) -> Result<bool> {
        queries::mark_order_refunded(self, order_id)
    }

    fn update_refunded_total(&self, order_id: &str, expected: Decimal, next: Decimal) -> Result<bool> {
        queries::update_refunded_total(self, order_id, expected, next)
    }

    fn append_note(&self, order_id: &str, note: &str) -> Result<()> {
        queries::add_order_note(self, order_id, note).map(|_| ())
    }

    fn set_session_id(&self, order_id: &str, session_id: &str) -> Result<()> {
        queries::set_order_session_id(self, order_id, session_id)
    }

    fn get_security_key(&self, order_id: &str) -> Result<Option<String>> {
        queries::get_order_key(self, order_id)
    }

    fn try_record_notification(&self, event_key: &str) -> Result<bool> {
        queries::try_record_webhook_event(self, event_key)
    }

    fn release_notification(&self, event_key: &str) -> Result<()> {
        queries::release_webhook_event(self, event_key)
    }

    fn cart_for(&self, order: &Order) -> Result<Option<Box<dyn Cart + '_>>> {
        let Some(cart_id) = order.cart_id.as_deref() else {
            return Ok(None);
        };
        Ok(queries::get_cart_by_id(self, cart_id)?
            .map(|record| Box::new(SqliteCart::new(self, record)) as Box<dyn Cart + '_>))
    }
}
