//! Conversion from decimal prices to the gateway's integer minor units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::PaymentsError;

/// One priced line of a payment-intent request.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLine {
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Sums `unit_price × quantity` and converts the total to cents.
///
/// Fractions of a cent round half away from zero.
///
/// # Errors
///
/// Returns [`PaymentsError::InvalidAmount`] when the total is not strictly
/// positive, a unit price is negative, or the total overflows.
pub fn total_minor_units(lines: &[PriceLine]) -> Result<i64, PaymentsError> {
    let mut total = Decimal::ZERO;
    for line in lines {
        if line.unit_price < Decimal::ZERO {
            return Err(PaymentsError::InvalidAmount(format!(
                "unit price must not be negative, got {}",
                line.unit_price
            )));
        }
        let subtotal = line
            .unit_price
            .checked_mul(Decimal::from(line.quantity))
            .ok_or_else(|| PaymentsError::InvalidAmount("line total overflows".to_string()))?;
        total = total
            .checked_add(subtotal)
            .ok_or_else(|| PaymentsError::InvalidAmount("order total overflows".to_string()))?;
    }

    if total <= Decimal::ZERO {
        return Err(PaymentsError::InvalidAmount(
            "total amount must be greater than zero".to_string(),
        ));
    }

    total
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| PaymentsError::InvalidAmount(format!("{total} is out of range")))
}
