//! paybridge - storefront bridge to a hosted-payments provider
//!
//! Opens hosted checkout sessions for orders and carts, and reconciles the
//! provider's return redirects and notification webhooks onto local orders.

pub mod amount;
pub mod checkout;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod store;
pub mod util;
