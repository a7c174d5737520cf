use chrono::Utc;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

use crate::crypto::generate_token;
use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{CART_COLS, ORDER_COLS, ORDER_NOTE_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// SQL list of status literals for guarded updates. Values come from the enum, never input.
fn status_list(statuses: &[OrderStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============ Carts ============

pub fn create_cart(conn: &Connection, input: &CreateCart) -> Result<CartRecord> {
    let id = EntityType::Cart.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO carts (id, customer_id, session_key, currency, total, item_count, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            &input.customer_id,
            &input.session_key,
            &input.currency,
            input.total.to_string(),
            input.item_count,
            now
        ],
    )?;

    Ok(CartRecord {
        id,
        customer_id: input.customer_id.clone(),
        session_key: input.session_key.clone(),
        currency: input.currency.clone(),
        total: input.total,
        item_count: input.item_count,
        updated_at: now,
    })
}

pub fn get_cart_by_id(conn: &Connection, id: &str) -> Result<Option<CartRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM carts WHERE id = ?1", CART_COLS),
        &[&id],
    )
}

/// Remove everything from a cart. Returns false if the cart was already empty.
pub fn empty_cart(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE carts SET total = '0', item_count = 0, updated_at = ?2
         WHERE id = ?1 AND item_count > 0",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

// ============ Orders ============

pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let id = EntityType::Order.gen_id();
    let order_key = format!("pb_key_{}", generate_token());
    let now = now();
    let b = &input.billing;

    conn.execute(
        "INSERT INTO orders (id, reference, payment_method_id, status, total, currency, order_key, cart_id,
                             billing_email, billing_first_name, billing_last_name, billing_address_1,
                             billing_address_2, billing_postcode, billing_city, billing_state, billing_country,
                             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)",
        params![
            &id,
            &input.reference,
            &input.payment_method_id,
            OrderStatus::Pending.as_ref(),
            input.total.to_string(),
            &input.currency,
            &order_key,
            &input.cart_id,
            &b.email,
            &b.first_name,
            &b.last_name,
            &b.address_1,
            &b.address_2,
            &b.postcode,
            &b.city,
            &b.state,
            &b.country,
            now
        ],
    )?;

    Ok(Order {
        id,
        reference: input.reference.clone(),
        payment_method_id: input.payment_method_id.clone(),
        status: OrderStatus::Pending,
        transaction_id: None,
        total: input.total,
        currency: input.currency.clone(),
        session_id: None,
        order_key,
        cart_id: input.cart_id.clone(),
        billing: input.billing.clone(),
        created_at: now,
        updated_at: now,
        paid_at: None,
        refunded_total: Decimal::ZERO,
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

pub fn get_order_by_reference(conn: &Connection, reference: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE reference = ?1", ORDER_COLS),
        &[&reference],
    )
}

pub fn get_order_by_session_id(conn: &Connection, session_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE session_id = ?1", ORDER_COLS),
        &[&session_id],
    )
}

pub fn get_order_key(conn: &Connection, order_id: &str) -> Result<Option<String>> {
    use rusqlite::OptionalExtension;
    conn.query_row(
        "SELECT order_key FROM orders WHERE id = ?1",
        params![order_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn count_orders(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
        .map_err(Into::into)
}

/// Move an order to `next` only if it currently sits in a status allowed to reach it.
/// Returns whether this call performed the transition.
fn transition_order(conn: &Connection, id: &str, next: OrderStatus) -> Result<bool> {
    let sources = OrderStatus::sources_for(next);
    let sql = format!(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
        status_list(&sources)
    );
    let affected = conn.execute(&sql, params![next.as_ref(), now(), id])?;
    Ok(affected > 0)
}

pub fn mark_order_pending(conn: &Connection, id: &str) -> Result<bool> {
    transition_order(conn, id, OrderStatus::Pending)
}

/// Atomically claim an order as paid.
///
/// Only unpaid orders match the guard, so concurrent return and webhook paths
/// cannot both win. An existing transaction id is kept.
pub fn mark_order_paid(conn: &Connection, id: &str, transaction_id: Option<&str>) -> Result<bool> {
    let sql = format!(
        "UPDATE orders
         SET status = ?1,
             transaction_id = CASE WHEN transaction_id IS NULL OR transaction_id = '' THEN ?2 ELSE transaction_id END,
             paid_at = ?3,
             updated_at = ?3
         WHERE id = ?4 AND status IN ({})",
        status_list(OrderStatus::PAYABLE)
    );
    let affected = conn.execute(
        &sql,
        params![OrderStatus::Processing.as_ref(), transaction_id, now(), id],
    )?;
    Ok(affected > 0)
}

/// Set the transaction id only if none is recorded yet.
pub fn backfill_transaction_id(conn: &Connection, id: &str, transaction_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET transaction_id = ?1, updated_at = ?2
         WHERE id = ?3 AND (transaction_id IS NULL OR transaction_id = '')",
        params![transaction_id, now(), id],
    )?;
    Ok(affected > 0)
}

pub fn mark_order_failed(conn: &Connection, id: &str) -> Result<bool> {
    transition_order(conn, id, OrderStatus::Failed)
}

pub fn mark_order_cancelled(conn: &Connection, id: &str) -> Result<bool> {
    transition_order(conn, id, OrderStatus::Cancelled)
}

pub fn mark_order_refunded(conn: &Connection, id: &str) -> Result<bool> {
    transition_order(conn, id, OrderStatus::Refunded)
}

/// Compare-and-set the refunded sum of a paid order.
///
/// Fails if the order left `processing`/`completed` or another refund moved the sum first.
pub fn update_refunded_total(conn: &Connection, id: &str, expected: Decimal, next: Decimal) -> Result<bool> {
    let sql = format!(
        "UPDATE orders SET refunded_total = ?1, updated_at = ?2
         WHERE id = ?3 AND refunded_total = ?4 AND status IN ({})",
        status_list(&[OrderStatus::Processing, OrderStatus::Completed])
    );
    let affected = conn.execute(
        &sql,
        params![next.to_string(), now(), id, expected.to_string()],
    )?;
    Ok(affected > 0)
}

pub fn set_order_session_id(conn: &Connection, id: &str, session_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE orders SET session_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![session_id, now(), id],
    )?;
    Ok(())
}

// ============ Order Notes ============

pub fn add_order_note(conn: &Connection, order_id: &str, note: &str) -> Result<OrderNote> {
    let id = EntityType::OrderNote.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO order_notes (id, order_id, note, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&id, order_id, note, now],
    )?;

    Ok(OrderNote {
        id,
        order_id: order_id.to_string(),
        note: note.to_string(),
        created_at: now,
    })
}

pub fn list_order_notes(conn: &Connection, order_id: &str) -> Result<Vec<OrderNote>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_notes WHERE order_id = ?1 ORDER BY created_at, rowid",
            ORDER_NOTE_COLS
        ),
        &[&order_id],
    )
}

// ============ Webhook Replay Prevention ============

/// Record a notification as processed. Returns false if it was seen before.
pub fn try_record_webhook_event(conn: &Connection, event_key: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (event_key, created_at) VALUES (?1, ?2)",
        params![event_key, now()],
    )?;
    Ok(affected > 0)
}

/// Forget a notification so a redelivery is processed again.
pub fn release_webhook_event(conn: &Connection, event_key: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM webhook_events WHERE event_key = ?1",
        params![event_key],
    )?;
    Ok(())
}

/// Purge processed-notification records older than the retention period.
/// The provider stops redelivering long before this matters.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
