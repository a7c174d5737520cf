mod from_row;
mod schema;
mod store;
pub mod queries;

pub use schema::init_db;
pub use store::SqliteCart;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::{Config, GatewayConfig};
use crate::payments::AdyenClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for return URLs (e.g., https://pay.example.com)
    pub base_url: String,
    /// Storefront checkout page
    pub checkout_url: String,
    /// Storefront order-received page
    pub success_page_url: String,
    pub gateway: Arc<GatewayConfig>,
    /// Bearer key for the admin endpoints
    pub admin_api_key: Option<String>,
    /// Secret for checkout nonces
    pub nonce_secret: String,
    /// Shared HTTP client for provider calls (connection pooling, fixed timeout)
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: &Config, db: DbPool, http_client: reqwest::Client) -> Self {
        Self {
            db,
            base_url: config.base_url.clone(),
            checkout_url: config.checkout_url.clone(),
            success_page_url: config.success_page_url.clone(),
            gateway: Arc::new(config.gateway.clone()),
            admin_api_key: config.admin_api_key.clone(),
            nonce_secret: config.nonce_secret.clone(),
            http_client,
        }
    }

    pub fn adyen_client(&self) -> AdyenClient {
        AdyenClient::new(&self.gateway, self.http_client.clone())
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
    Pool::builder().max_size(10).build(manager)
}
