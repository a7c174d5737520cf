use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A shopper's cart. Only the totals matter to checkout; line items live in the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartRecord {
    pub id: String,
    /// Logged-in customer, if any
    pub customer_id: Option<String>,
    /// Storefront session key for guest carts
    pub session_key: Option<String>,
    pub currency: String,
    pub total: Decimal,
    pub item_count: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCart {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
    pub currency: String,
    pub total: Decimal,
    pub item_count: i64,
}
