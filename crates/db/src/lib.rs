pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod recompute;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{SeedDataset, SeedVerification};
pub use recompute::{ClaimSet, RecomputeError, RecomputeJob};
pub use repositories::{
    OrderRepository, ProfileRepository, RepositoryError, SqlOrderRepository, SqlProfileRepository,
};
