//! Conversion between decimal store amounts and provider minor units.
//!
//! Everything stays in `Decimal`; floats never touch money.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, Result, msg};

/// Currencies the provider expects without a fractional part.
pub const ZERO_DECIMAL_CURRENCIES: &[&str] = &["JPY", "KRW", "VND", "ISK", "CLP"];

pub fn is_zero_decimal(currency: &str) -> bool {
    let currency = currency.trim();
    ZERO_DECIMAL_CURRENCIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(currency))
}

/// Decimal amount to integer minor units, rounding half away from zero.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64> {
    let scaled = if is_zero_decimal(currency) {
        amount
    } else {
        amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| AppError::BadRequest(msg::AMOUNT_OUT_OF_RANGE.into()))?
    };

    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::BadRequest(msg::AMOUNT_OUT_OF_RANGE.into()))
}

/// Integer minor units back to a decimal amount.
pub fn to_decimal_units(minor: i64, currency: &str) -> Decimal {
    if is_zero_decimal(currency) {
        Decimal::from(minor)
    } else {
        Decimal::new(minor, 2)
    }
}
