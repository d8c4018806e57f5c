use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::profile::{PricingProfile, ProfileId};
use crate::pricing::calculator::{price, PricingError};
use crate::pricing::tier::TierTableError;

/// One requested line item: a number and the allocation to price for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySpec {
    pub number: i64,
    pub allocation_units: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PricedEntry {
    pub number: i64,
    pub allocation_units: Decimal,
    pub cost: Decimal,
}

/// A fully priced order ready to persist in one transaction.
///
/// The profile snapshot fields are captured here, at assembly time, and are
/// final: later profile renames or deletions never flow back into the draft
/// or the rows persisted from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderDraft {
    pub user_email: String,
    pub pricing_profile_id: ProfileId,
    pub pricing_profile_name: String,
    pub total_count: i64,
    pub entries: Vec<PricedEntry>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderAssemblyError {
    #[error("an order must contain at least one entry")]
    NoEntries,
    #[error("profile {profile_id} has an invalid tier table: {source}")]
    InvalidTierTable {
        profile_id: i64,
        #[source]
        source: TierTableError,
    },
    #[error("entry {index} failed to price: {source}")]
    EntryPricing {
        index: usize,
        #[source]
        source: PricingError,
    },
}

/// Price every entry spec against the profile and capture the profile
/// snapshot. All-or-nothing: the first failure aborts the whole assembly and
/// names the entry that caused it, so no partially-priced draft ever exists.
pub fn assemble_order(
    user_email: &str,
    profile: &PricingProfile,
    specs: &[EntrySpec],
) -> Result<OrderDraft, OrderAssemblyError> {
    if specs.is_empty() {
        return Err(OrderAssemblyError::NoEntries);
    }

    let table = profile.tier_table().map_err(|source| OrderAssemblyError::InvalidTierTable {
        profile_id: profile.id.0,
        source,
    })?;

    let mut entries = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let cost = price(spec.allocation_units, &table)
            .map_err(|source| OrderAssemblyError::EntryPricing { index, source })?;
        entries.push(PricedEntry {
            number: spec.number,
            allocation_units: spec.allocation_units,
            cost,
        });
    }

    Ok(OrderDraft {
        user_email: user_email.to_string(),
        pricing_profile_id: profile.id,
        pricing_profile_name: profile.name.clone(),
        total_count: entries.len() as i64,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::profile::{PricingProfile, ProfileId};
    use crate::pricing::tier::Tier;

    use super::{assemble_order, EntrySpec, OrderAssemblyError};

    fn profile() -> PricingProfile {
        PricingProfile {
            id: ProfileId(7),
            name: "Standard Volume".to_string(),
            tiers: vec![
                Tier {
                    floor_units: Decimal::ZERO,
                    ceiling_units: Some(Decimal::from(50)),
                    unit_price: Decimal::from(2),
                },
                Tier {
                    floor_units: Decimal::from(50),
                    ceiling_units: None,
                    unit_price: Decimal::ONE,
                },
            ],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn prices_every_entry_and_snapshots_the_profile() {
        let specs = vec![
            EntrySpec { number: 1001, allocation_units: Decimal::from(30) },
            EntrySpec { number: 1002, allocation_units: Decimal::from(80) },
        ];

        let draft = assemble_order("user@example.com", &profile(), &specs).expect("assemble");

        assert_eq!(draft.total_count, 2);
        assert_eq!(draft.pricing_profile_id, ProfileId(7));
        assert_eq!(draft.pricing_profile_name, "Standard Volume");
        assert_eq!(draft.entries[0].cost, Decimal::new(6000, 2));
        assert_eq!(draft.entries[1].cost, Decimal::new(8000, 2));
    }

    #[test]
    fn one_bad_entry_aborts_the_whole_assembly() {
        let specs = vec![
            EntrySpec { number: 1001, allocation_units: Decimal::from(30) },
            EntrySpec { number: 1002, allocation_units: Decimal::from(-5) },
        ];

        let error =
            assemble_order("user@example.com", &profile(), &specs).expect_err("negative entry");
        assert!(matches!(error, OrderAssemblyError::EntryPricing { index: 1, .. }));
    }

    #[test]
    fn invalid_stored_tiers_are_caught_before_pricing() {
        let mut bad = profile();
        bad.tiers.remove(1); // bounded last tier, table no longer covers [0, inf)

        let specs = vec![EntrySpec { number: 1001, allocation_units: Decimal::from(30) }];
        let error = assemble_order("user@example.com", &bad, &specs).expect_err("invalid tiers");
        assert!(matches!(error, OrderAssemblyError::InvalidTierTable { profile_id: 7, .. }));
    }

    #[test]
    fn empty_entry_list_is_rejected() {
        let error = assemble_order("user@example.com", &profile(), &[]).expect_err("no entries");
        assert_eq!(error, OrderAssemblyError::NoEntries);
    }

    #[test]
    fn renaming_the_profile_after_assembly_does_not_touch_the_snapshot() {
        let mut profile = profile();
        let specs = vec![EntrySpec { number: 1001, allocation_units: Decimal::from(30) }];
        let draft = assemble_order("user@example.com", &profile, &specs).expect("assemble");

        profile.name = "Renamed Volume".to_string();

        assert_eq!(draft.pricing_profile_name, "Standard Volume");
    }
}
