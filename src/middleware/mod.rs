mod admin_auth;
mod webhook_auth;

pub use admin_auth::*;
pub use webhook_auth::*;
