//! Row mapping trait and helpers for reducing boilerplate in queries.

use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use rust_decimal::Decimal;

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors
/// instead of panicking on bad data.
fn parse_enum<T: FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Decimal amounts are stored as TEXT to keep them exact.
fn parse_decimal(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(&row.get::<_, String>(col)?).map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ORDER_COLS: &str = "id, reference, payment_method_id, status, transaction_id, total, currency, session_id, order_key, cart_id, billing_email, billing_first_name, billing_last_name, billing_address_1, billing_address_2, billing_postcode, billing_city, billing_state, billing_country, created_at, updated_at, paid_at, refunded_total";

pub const ORDER_NOTE_COLS: &str = "id, order_id, note, created_at";

pub const CART_COLS: &str =
    "id, customer_id, session_key, currency, total, item_count, updated_at";

// ============ FromRow Implementations ============

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            reference: row.get(1)?,
            payment_method_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            transaction_id: row.get(4)?,
            total: parse_decimal(row, 5, "total")?,
            currency: row.get(6)?,
            session_id: row.get(7)?,
            order_key: row.get(8)?,
            cart_id: row.get(9)?,
            billing: BillingDetails {
                email: row.get(10)?,
                first_name: row.get(11)?,
                last_name: row.get(12)?,
                address_1: row.get(13)?,
                address_2: row.get(14)?,
                postcode: row.get(15)?,
                city: row.get(16)?,
                state: row.get(17)?,
                country: row.get(18)?,
            },
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
            paid_at: row.get(21)?,
            refunded_total: parse_decimal(row, 22, "refunded_total")?,
        })
    }
}

impl FromRow for OrderNote {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderNote {
            id: row.get(0)?,
            order_id: row.get(1)?,
            note: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for CartRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CartRecord {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            session_key: row.get(2)?,
            currency: row.get(3)?,
            total: parse_decimal(row, 4, "total")?,
            item_count: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}
