//! Secrets, tokens and constant-time comparison helpers.
//!
//! Provider notification signatures live in `payments::notification`; this
//! module covers the secrets paybridge owns itself.

use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Random 128-bit token, hex encoded. Used for order keys.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Random 256-bit secret, hex encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time string equality. Length is not treated as secret.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Anti-forgery nonce binding a checkout request to a cart.
///
/// Stateless: the nonce is the HMAC of the cart id under the server secret, so
/// only pages rendered by the storefront (which holds the nonce) can open sessions.
pub fn create_nonce(secret: &str, cart_id: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid nonce secret: {}", e)))?;
    mac.update(b"paybridge-checkout:");
    mac.update(cart_id.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_nonce(secret: &str, cart_id: &str, nonce: &str) -> bool {
    match create_nonce(secret, cart_id) {
        Ok(expected) => constant_time_eq(&expected, nonce.trim()),
        Err(_) => false,
    }
}
