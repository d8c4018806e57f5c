use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::profile::ProfileId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Active,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Active,
    Cancelled,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown entry status `{0}` (expected pending|active|cancelled)")]
pub struct UnknownStatus(pub String);

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An order with the pricing-profile identity denormalized onto it.
///
/// `pricing_profile_name` is a creation-time copy and is never touched by
/// later renames; `pricing_profile_id` may reference a profile that has
/// since been deleted, which downstream code treats as a fallback case, not
/// corruption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_email: String,
    pub status: OrderStatus,
    pub total_count: i64,
    pub pricing_profile_id: ProfileId,
    pub pricing_profile_name: String,
    pub created_at: DateTime<Utc>,
}

/// One priced line item within an order.
///
/// `cost` is a finalized snapshot: null only for legacy rows awaiting a
/// backfill recompute, and once set it changes only when a recompute run
/// explicitly overwrites it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub id: EntryId,
    pub order_id: OrderId,
    pub number: i64,
    pub allocation_units: Decimal,
    pub status: EntryStatus,
    pub cost: Option<Decimal>,
}
