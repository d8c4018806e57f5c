use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One contiguous allocation-volume range priced at a single per-unit rate.
///
/// A tier covers `[floor_units, ceiling_units)`; the last tier in a table has
/// `ceiling_units = None` and covers to infinity. Ceilings are exclusive, so
/// an allocation sitting exactly on a boundary belongs to the tier whose
/// floor equals it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub floor_units: Decimal,
    pub ceiling_units: Option<Decimal>,
    pub unit_price: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierTableReason {
    Empty,
    Gap,
    Overlap,
    NegativePrice,
    NotOpenEnded,
}

impl fmt::Display for TierTableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Empty => "table has no tiers",
            Self::Gap => "coverage gap before this tier",
            Self::Overlap => "tier overlaps its neighbor",
            Self::NegativePrice => "unit price is negative",
            Self::NotOpenEnded => "last tier must be open-ended",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[error("invalid tier table at tier {index}: {reason}")]
pub struct TierTableError {
    pub index: usize,
    pub reason: TierTableReason,
}

/// A validated, ordered tier table covering `[0, ∞)` with no gaps or
/// overlaps. Only constructible through [`TierTable::validate`], so holding
/// one is proof the invariants hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TierTable(Vec<Tier>);

impl TierTable {
    /// Validate an authored tier list into a usable table.
    ///
    /// Enforced: non-empty; `floor[0] == 0`; each ceiling equals the next
    /// floor (contiguous, gapless, non-overlapping); non-negative prices;
    /// exactly one open-ended tier, and it is last. The offending tier index
    /// is reported on failure.
    pub fn validate(tiers: Vec<Tier>) -> Result<Self, TierTableError> {
        let Some(first) = tiers.first() else {
            return Err(TierTableError { index: 0, reason: TierTableReason::Empty });
        };
        if first.floor_units > Decimal::ZERO {
            return Err(TierTableError { index: 0, reason: TierTableReason::Gap });
        }
        if first.floor_units < Decimal::ZERO {
            return Err(TierTableError { index: 0, reason: TierTableReason::Overlap });
        }

        let last_index = tiers.len() - 1;
        for (index, tier) in tiers.iter().enumerate() {
            if tier.unit_price < Decimal::ZERO {
                return Err(TierTableError { index, reason: TierTableReason::NegativePrice });
            }
            match (tier.ceiling_units, index == last_index) {
                (None, true) => {}
                // An open-ended tier anywhere but last swallows every tier
                // after it.
                (None, false) => {
                    return Err(TierTableError { index, reason: TierTableReason::Overlap })
                }
                (Some(_), true) => {
                    return Err(TierTableError { index, reason: TierTableReason::NotOpenEnded })
                }
                (Some(ceiling), false) => {
                    if ceiling <= tier.floor_units {
                        return Err(TierTableError { index, reason: TierTableReason::Overlap });
                    }
                    let next_floor = tiers[index + 1].floor_units;
                    if ceiling < next_floor {
                        return Err(TierTableError {
                            index: index + 1,
                            reason: TierTableReason::Gap,
                        });
                    }
                    if ceiling > next_floor {
                        return Err(TierTableError {
                            index: index + 1,
                            reason: TierTableReason::Overlap,
                        });
                    }
                }
            }
        }

        Ok(Self(tiers))
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.0
    }

    pub fn into_tiers(self) -> Vec<Tier> {
        self.0
    }

    /// The unique tier covering `allocation_units`.
    ///
    /// Well-defined for any non-negative allocation because the table is
    /// contiguous and open-ended: the match is the tier with the highest
    /// floor not exceeding the allocation.
    pub fn tier_for(&self, allocation_units: Decimal) -> &Tier {
        self.0
            .iter()
            .rev()
            .find(|tier| allocation_units >= tier.floor_units)
            .unwrap_or(&self.0[0])
    }
}
