use axum::Router;
use clap::Parser;
use rust_decimal::Decimal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paybridge::checkout;
use paybridge::config::Config;
use paybridge::crypto::create_nonce;
use paybridge::db::{AppState, create_pool, init_db, queries};
use paybridge::handlers;
use paybridge::models::{BillingDetails, CreateCart, CreateOrder};
use paybridge::payments::build_http_client;

/// Processed-notification records older than this are purged at startup.
const WEBHOOK_EVENT_RETENTION_DAYS: i64 = 30;

#[derive(Parser, Debug)]
#[command(name = "paybridge")]
#[command(about = "Storefront bridge to hosted Apple Pay checkout")]
struct Cli {
    /// Seed the database with dev data (a cart and a pending order)
    #[arg(long)]
    seed: bool,

    /// Check the provider credentials by opening a test session, then exit
    #[arg(long)]
    test_connection: bool,
}

/// Seeds the database with a cart and a pending order for manual testing.
/// Only runs in dev mode and when no orders exist.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_orders(&conn).expect("Failed to count orders");
    if count > 0 {
        tracing::info!("Database already has orders, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let cart = queries::create_cart(
        &conn,
        &CreateCart {
            customer_id: None,
            session_key: Some("dev-session-0001".to_string()),
            currency: "EUR".to_string(),
            total: Decimal::new(4999, 2),
            item_count: 1,
        },
    )
    .expect("Failed to create dev cart");

    let order = queries::create_order(
        &conn,
        &CreateOrder {
            reference: "DEV-1001".to_string(),
            payment_method_id: state.gateway.gateway_id.clone(),
            total: cart.total,
            currency: cart.currency.clone(),
            cart_id: Some(cart.id.clone()),
            billing: BillingDetails {
                email: Some("shopper@paybridge.local".to_string()),
                first_name: Some("Dev".to_string()),
                last_name: Some("Shopper".to_string()),
                country: Some("NL".to_string()),
                ..Default::default()
            },
        },
    )
    .expect("Failed to create dev order");

    let nonce = create_nonce(&state.nonce_secret, &cart.id).expect("Failed to create nonce");

    tracing::info!("Cart: {} ({} {})", cart.id, cart.total, cart.currency);
    tracing::info!("Order: {} (reference {})", order.id, order.reference);
    tracing::info!("============================================");

    println!();
    println!("--- COPY FROM HERE ---");
    println!("  cart_id: {}", cart.id);
    println!("  cart_nonce: {}", nonce);
    println!("  order_id: {}", order.id);
    println!("  order_reference: {}", order.reference);
    println!("--- END COPY ---");
    println!();
}

fn purge_webhook_events(state: &AppState) {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Failed to get db connection for purge: {}", e);
            return;
        }
    };
    match queries::purge_old_webhook_events(&conn, WEBHOOK_EVENT_RETENTION_DAYS) {
        Ok(count) if count > 0 => {
            tracing::info!(
                "Purged {} processed notification records older than {} days",
                count,
                WEBHOOK_EVENT_RETENTION_DAYS
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to purge processed notifications: {}", e),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paybridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    tracing::debug!(gateway = ?config.gateway, "Gateway configuration loaded");

    if !config.gateway.is_available() {
        tracing::warn!("Gateway credentials incomplete - checkout endpoints will refuse payments");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let http_client = build_http_client().expect("Failed to build HTTP client");
    let state = AppState::new(&config, db_pool, http_client);

    if cli.test_connection {
        let check = checkout::test_connection(&state).await;
        println!("[{}] {}", check.mode, check.message);
        if !check.success {
            std::process::exit(1);
        }
        return;
    }

    purge_webhook_events(&state);

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set PAYBRIDGE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    if state.admin_api_key.is_none() {
        tracing::warn!("PAYBRIDGE_ADMIN_API_KEY not set - admin endpoints are disabled");
    }

    let app = Router::new()
        // Health, shopper return and checkout endpoints
        .merge(handlers::public::router())
        // Provider notifications (Basic Auth)
        .merge(handlers::webhooks::router(state.clone()))
        // Refunds and credential checks (admin bearer key)
        .merge(handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("paybridge listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
