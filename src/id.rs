//! Prefixed ID generation for paybridge entities.
//!
//! All IDs use a `pb_` brand prefix so they never collide with merchant order
//! numbers or provider PSP references that share the same lookup paths.
//!
//! Format: `pb_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

const ALL_PREFIXES: &[&str] = &["pb_ord_", "pb_cart_", "pb_note_"];

/// Validate that a string is a well-formed paybridge ID.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Order,
    Cart,
    OrderNote,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Order => "pb_ord",
            Self::Cart => "pb_cart",
            Self::OrderNote => "pb_note",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
