use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use super::tier::TierTable;

/// Currency precision for finalized costs, in decimal places.
pub const CURRENCY_SCALE: u32 = 2;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("allocation must be non-negative, got {0}")]
    NegativeAllocation(Decimal),
}

/// Price an allocation against a validated tier table.
///
/// Pure and deterministic: the whole allocation is billed at the rate of the
/// single tier covering it, and rounding (half-up, two decimal places)
/// happens exactly once on the final amount so repeated pricing can never
/// drift. A zero allocation prices to zero under tier 0; a negative
/// allocation is a precondition violation, never clamped.
pub fn price(allocation_units: Decimal, tiers: &TierTable) -> Result<Decimal, PricingError> {
    if allocation_units < Decimal::ZERO {
        return Err(PricingError::NegativeAllocation(allocation_units));
    }

    let tier = tiers.tier_for(allocation_units);
    Ok((allocation_units * tier.unit_price)
        .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero))
}
