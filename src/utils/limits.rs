use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

/// Travellers (adults plus children) allowed on one line.
pub const MAX_TRAVELLERS_PER_LINE: i32 = 100;

pub const TITLE_MAX_LEN: usize = 200;
pub const PAYMENT_METHOD_MAX_LEN: usize = 50;
pub const PROVIDER_REFERENCE_MAX_LEN: usize = 255;
pub const CONTACT_NAME_MAX_LEN: usize = 150;
pub const CONTACT_EMAIL_MAX_LEN: usize = 255;
pub const CONTACT_PHONE_MAX_LEN: usize = 40;

/// Largest amount a NUMERIC(12,2) column holds: 9,999,999,999.99
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Reject amounts the money columns cannot store.
pub fn ensure_money(field: &str, amount: Decimal) -> AppResult<Decimal> {
    if amount > max_money() {
        return Err(AppError::BadRequest(format!("{} exceeds {}", field, max_money())));
    }
    Ok(amount)
}

/// Reject text longer than its VARCHAR column, counted in characters.
pub fn ensure_max_len(field: &str, value: Option<&str>, max: usize) -> AppResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}
