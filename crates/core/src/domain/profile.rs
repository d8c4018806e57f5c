use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::tier::{Tier, TierTable, TierTableError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub i64);

/// A named tier table owned by the administrative subsystem.
///
/// Identity is immutable; `name` and `tiers` may change over the profile's
/// lifetime, which is why orders snapshot the name at creation time and why
/// finalized costs are never recomputed implicitly on edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingProfile {
    pub id: ProfileId,
    pub name: String,
    pub tiers: Vec<Tier>,
    pub created_at: DateTime<Utc>,
}

impl PricingProfile {
    /// Re-validate the stored tiers into a usable table.
    ///
    /// Tiers are held as persisted, so every pricing path goes through this
    /// check rather than trusting rows another writer may have produced.
    pub fn tier_table(&self) -> Result<TierTable, TierTableError> {
        TierTable::validate(self.tiers.clone())
    }
}
