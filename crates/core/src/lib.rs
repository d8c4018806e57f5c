pub mod config;
pub mod domain;
pub mod orders;
pub mod pricing;
pub mod recompute;

pub use domain::order::{
    EntryId, EntryStatus, Order, OrderEntry, OrderId, OrderStatus, UnknownStatus,
};
pub use domain::profile::{PricingProfile, ProfileId};
pub use orders::{assemble_order, EntrySpec, OrderAssemblyError, OrderDraft, PricedEntry};
pub use pricing::calculator::{price, PricingError, CURRENCY_SCALE};
pub use pricing::tier::{Tier, TierTable, TierTableError, TierTableReason};
pub use recompute::{
    BatchOutcome, BatchStatus, CancelToken, EntryFailure, EntrySelector, RecomputeReport,
};
