use std::env;

/// Default payment method id stamped on orders that go through this gateway.
pub const DEFAULT_GATEWAY_ID: &str = "adyen_apple_pay";

const TEST_BASE_URL: &str = "https://checkout-test.adyen.com/v70";
const LIVE_FALLBACK_BASE_URL: &str = "https://checkout-live.adyen.com/v70";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Public base URL of this service (return and webhook endpoints hang off it)
    pub base_url: String,
    /// Storefront checkout page; failed returns are redirected here
    pub checkout_url: String,
    /// Storefront order-received page
    pub success_page_url: String,
    /// Bearer key for the admin endpoints (refund, test connection). None disables them.
    pub admin_api_key: Option<String>,
    /// Secret used to sign anti-forgery nonces for the session endpoint
    pub nonce_secret: String,
    pub dev_mode: bool,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("PAYBRIDGE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let checkout_url =
            env::var("CHECKOUT_URL").unwrap_or_else(|_| format!("{}/checkout", base_url));
        let success_page_url = env::var("SUCCESS_PAGE_URL")
            .unwrap_or_else(|_| format!("{}/checkout/order-received", base_url));

        let nonce_secret = match env::var("PAYBRIDGE_NONCE_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!(
                    "PAYBRIDGE_NONCE_SECRET not set - generating an ephemeral secret (nonces will not survive restarts)"
                );
                crate::crypto::generate_secret()
            }
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "paybridge.db".to_string()),
            base_url,
            checkout_url,
            success_page_url,
            admin_api_key: non_empty_var("PAYBRIDGE_ADMIN_API_KEY"),
            nonce_secret,
            dev_mode,
            gateway: GatewayConfig::from_env(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Provider environment. Live accounts get an account-specific URL prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Test,
    Live { url_prefix: Option<String> },
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Live { .. } => "live",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }

    /// Checkout API base URL for this environment.
    ///
    /// The generic live URL is known to fail for accounts that were issued a
    /// prefix, so falling back to it is logged.
    pub fn base_url(&self) -> String {
        match self {
            Environment::Test => TEST_BASE_URL.to_string(),
            Environment::Live {
                url_prefix: Some(prefix),
            } => format!(
                "https://{}-checkout-live.adyenpayments.com/checkout/v70",
                prefix
            ),
            Environment::Live { url_prefix: None } => {
                tracing::warn!(
                    "Live URL prefix not configured - using fallback URL {} which may not work",
                    LIVE_FALLBACK_BASE_URL
                );
                LIVE_FALLBACK_BASE_URL.to_string()
            }
        }
    }
}

/// Credentials and settings for the hosted-payments provider.
///
/// Read once at startup and passed down explicitly; request handlers never
/// look configuration up from the environment.
#[derive(Clone, Default)]
pub struct GatewayConfig {
    /// Payment method id orders must carry before this gateway may touch them
    pub gateway_id: String,
    pub merchant_account: String,
    pub api_key: String,
    pub client_key: String,
    pub environment: Option<Environment>,
    /// Hex-encoded HMAC key for notification signatures
    pub hmac_key: Option<String>,
    pub webhook_username: Option<String>,
    pub webhook_password: Option<String>,
    /// Reject webhooks when credentials or the HMAC key are not configured
    pub webhook_strict: bool,
    /// Overrides the environment-derived API base URL
    pub api_base_url: Option<String>,
    pub merchant_name: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let test_mode = env::var("ADYEN_TEST_MODE")
            .map(|v| matches!(v.to_lowercase().as_str(), "yes" | "true" | "1"))
            .unwrap_or(true);

        let (api_key, client_key) = if test_mode {
            (
                env::var("ADYEN_TEST_API_KEY").unwrap_or_default(),
                env::var("ADYEN_TEST_CLIENT_KEY").unwrap_or_default(),
            )
        } else {
            (
                env::var("ADYEN_LIVE_API_KEY").unwrap_or_default(),
                env::var("ADYEN_LIVE_CLIENT_KEY").unwrap_or_default(),
            )
        };

        let environment = if test_mode {
            Environment::Test
        } else {
            Environment::Live {
                url_prefix: non_empty_var("ADYEN_LIVE_URL_PREFIX"),
            }
        };

        Self {
            gateway_id: env::var("ADYEN_GATEWAY_ID")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_ID.to_string()),
            merchant_account: env::var("ADYEN_MERCHANT_ACCOUNT").unwrap_or_default(),
            api_key,
            client_key,
            environment: Some(environment),
            hmac_key: non_empty_var("ADYEN_HMAC_KEY"),
            webhook_username: non_empty_var("ADYEN_WEBHOOK_USERNAME"),
            webhook_password: non_empty_var("ADYEN_WEBHOOK_PASSWORD"),
            webhook_strict: env::var("ADYEN_WEBHOOK_STRICT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            api_base_url: non_empty_var("ADYEN_API_BASE_URL"),
            merchant_name: env::var("MERCHANT_NAME").unwrap_or_else(|_| "Store".to_string()),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment.clone().unwrap_or(Environment::Test)
    }

    /// Base URL for provider API calls.
    pub fn api_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => self.environment().base_url(),
        }
    }

    /// Whether checkout can be offered at all.
    pub fn is_available(&self) -> bool {
        if self.merchant_account.is_empty() {
            tracing::debug!("Gateway not available - merchant account is empty");
            return false;
        }
        if self.api_key.is_empty() {
            tracing::debug!(
                test_mode = self.environment().is_test(),
                "Gateway not available - API key is empty"
            );
            return false;
        }
        if self.client_key.is_empty() {
            tracing::debug!(
                test_mode = self.environment().is_test(),
                "Gateway not available - client key is empty"
            );
            return false;
        }
        true
    }

    /// Both halves of the webhook Basic Auth pair, if configured.
    pub fn webhook_credentials(&self) -> Option<(&str, &str)> {
        match (&self.webhook_username, &self.webhook_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("gateway_id", &self.gateway_id)
            .field("merchant_account", &self.merchant_account)
            .field("api_key", &format_args!("[{} chars]", self.api_key.len()))
            .field("client_key", &format_args!("[{} chars]", self.client_key.len()))
            .field("environment", &self.environment)
            .field("hmac_key", &self.hmac_key.as_ref().map(|_| "[set]"))
            .field("webhook_username", &self.webhook_username)
            .field("webhook_password", &self.webhook_password.as_ref().map(|_| "[set]"))
            .field("webhook_strict", &self.webhook_strict)
            .field("api_base_url", &self.api_base_url)
            .field("merchant_name", &self.merchant_name)
            .finish()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
