use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use tierline_core::domain::order::{Order, OrderEntry, OrderId};
use tierline_core::domain::profile::{PricingProfile, ProfileId};
use tierline_core::orders::OrderDraft;
use tierline_core::pricing::tier::TierTable;

pub mod order;
pub mod profile;

pub use order::SqlOrderRepository;
pub use profile::SqlProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: ProfileId) -> Result<Option<PricingProfile>, RepositoryError>;
    /// Persist a profile whose tiers already passed validation; the
    /// `TierTable` parameter makes an unvalidated insert unrepresentable.
    async fn create(&self, name: &str, tiers: &TierTable)
        -> Result<PricingProfile, RepositoryError>;
    async fn rename(&self, id: ProfileId, name: &str) -> Result<bool, RepositoryError>;
    async fn replace_tiers(&self, id: ProfileId, tiers: &TierTable)
        -> Result<bool, RepositoryError>;
    async fn delete(&self, id: ProfileId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a priced draft as one atomic unit: the order row and every
    /// entry row, or nothing.
    async fn create_order(
        &self,
        draft: &OrderDraft,
    ) -> Result<(Order, Vec<OrderEntry>), RepositoryError>;
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn entries_for_order(&self, id: OrderId) -> Result<Vec<OrderEntry>, RepositoryError>;
}

pub(crate) fn decimal_from_text(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    value
        .parse()
        .map_err(|_| RepositoryError::Decode(format!("invalid decimal in {field}: `{value}`")))
}
