//! Money and line-item validation using rust_decimal
//!
//! Prices are stored exactly as recorded at order time. Totals are always
//! computed from those recorded prices, never from the live catalog.

use super::error::{ServiceError, ServiceResult};
use rust_decimal::prelude::*;
use shared::models::{LineItem, LineItemInput, TicketLine};

/// Rounding strategy for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed price per item (€1,000,000)
const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
/// Maximum allowed quantity per line
pub const MAX_QUANTITY: u32 = 9999;

/// Round a monetary value to cents
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate a quantity
pub fn validate_quantity(quantity: u32) -> ServiceResult<()> {
    if quantity == 0 {
        return Err(ServiceError::validation("quantity must be at least 1"));
    }
    if quantity > MAX_QUANTITY {
        return Err(ServiceError::Validation(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// Validate a price
pub fn validate_price(price: Decimal) -> ServiceResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::Validation(format!(
            "price must be non-negative, got {}",
            price
        )));
    }
    if price > MAX_PRICE {
        return Err(ServiceError::Validation(format!(
            "price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, price
        )));
    }
    Ok(())
}

/// Validate the caller-controlled parts of a line item input
pub fn validate_line_input(input: &LineItemInput) -> ServiceResult<()> {
    validate_quantity(input.quantity)?;
    if let Some(price) = input.price {
        validate_price(price)?;
    }
    if input.catalog_item_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(ServiceError::validation("catalog_item_id must not be blank"));
    }
    Ok(())
}

/// Sum of line totals
pub fn sum_lines<'a>(lines: impl IntoIterator<Item = &'a LineItem>) -> Decimal {
    round_money(lines.into_iter().map(LineItem::line_total).sum())
}

/// Point-in-time ticket copy of a line
pub fn ticket_line(line: &LineItem) -> TicketLine {
    TicketLine {
        line_id: line.line_id.clone(),
        catalog_item_id: line.catalog_item_id.clone(),
        name: line.name.clone(),
        quantity: line.quantity,
        unit_price: line.unit_price,
        line_total: line.line_total(),
        variant: line.variant.clone(),
    }
}
