use rusqlite::Connection;

/// Initialize the database schema
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Shopper carts (totals only; line items belong to the storefront)
        CREATE TABLE IF NOT EXISTS carts (
            id TEXT PRIMARY KEY,
            customer_id TEXT,
            session_key TEXT,
            currency TEXT NOT NULL,
            total TEXT NOT NULL,
            item_count INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        -- Orders
        -- total and refunded_total are decimal strings; status transitions are guarded in queries
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            reference TEXT NOT NULL UNIQUE,
            payment_method_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'processing', 'completed', 'on_hold', 'failed', 'cancelled', 'refunded')),
            transaction_id TEXT,
            total TEXT NOT NULL,
            refunded_total TEXT NOT NULL DEFAULT '0',
            currency TEXT NOT NULL,
            session_id TEXT,
            order_key TEXT NOT NULL,
            cart_id TEXT REFERENCES carts(id) ON DELETE SET NULL,
            billing_email TEXT,
            billing_first_name TEXT,
            billing_last_name TEXT,
            billing_address_1 TEXT,
            billing_address_2 TEXT,
            billing_postcode TEXT,
            billing_city TEXT,
            billing_state TEXT,
            billing_country TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            paid_at INTEGER
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_session ON orders(session_id) WHERE session_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_orders_transaction ON orders(transaction_id) WHERE transaction_id IS NOT NULL;

        -- Order notes (append-only history shown to the merchant)
        CREATE TABLE IF NOT EXISTS order_notes (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            note TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_order_notes_order ON order_notes(order_id, created_at);

        -- Processed provider notifications, keyed by eventCode:pspReference:success
        CREATE TABLE IF NOT EXISTS webhook_events (
            event_key TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        );
        "#,
    )
}
