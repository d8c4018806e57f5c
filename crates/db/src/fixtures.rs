use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_PROFILE_IDS: &[i64] = &[1, 2];
const SEED_ORDER_IDS: &[i64] = &[1, 2];
const SEED_ENTRY_IDS: &[i64] = &[1, 2, 3];

/// Deterministic seed dataset: two pricing profiles, one fully priced order
/// and one legacy order whose entry still awaits a cost backfill.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_orders.sql");

    pub async fn load(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Verify the seeded rows match the contract the tests rely on.
    pub async fn verify(pool: &DbPool) -> Result<SeedVerification, RepositoryError> {
        let mut checks = Vec::new();

        let profile_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM pricing_profiles WHERE id IN (1, 2)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("profiles", profile_count == SEED_PROFILE_IDS.len() as i64));

        let order_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM orders WHERE id IN (1, 2)")
                .fetch_one(pool)
                .await?;
        checks.push(("orders", order_count == SEED_ORDER_IDS.len() as i64));

        let entry_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM order_entries WHERE id IN (1, 2, 3)")
                .fetch_one(pool)
                .await?;
        checks.push(("entries", entry_count == SEED_ENTRY_IDS.len() as i64));

        for order_id in SEED_ORDER_IDS {
            let counts_match: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM orders o
                     WHERE o.id = ?1
                       AND o.total_count = (SELECT COUNT(1) FROM order_entries e WHERE e.order_id = o.id)
                 )",
            )
            .bind(*order_id)
            .fetch_one(pool)
            .await?;
            checks.push(("order-total-count", counts_match == 1));
        }

        let legacy_cost_null: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM order_entries WHERE id = 3 AND cost IS NULL)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("legacy-entry-unpriced", legacy_cost_null == 1));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(SeedVerification { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM cost_revisions WHERE entry_id IN (1, 2, 3)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM order_entries WHERE id IN (1, 2, 3)").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM orders WHERE id IN (1, 2)").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM pricing_profiles WHERE id IN (1, 2)").execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedVerification {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::SeedDataset;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_non_empty() {
        assert!(!SeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn seed_load_and_verify_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        SeedDataset::load(&pool).await.expect("first load");
        let first = SeedDataset::verify(&pool).await.expect("first verify");
        assert!(first.all_present, "checks: {:?}", first.checks);

        SeedDataset::load(&pool).await.expect("second load");
        let second = SeedDataset::verify(&pool).await.expect("second verify");
        assert!(second.all_present);
        assert_eq!(first.checks, second.checks);

        SeedDataset::clean(&pool).await.expect("clean");
        let after_clean = SeedDataset::verify(&pool).await.expect("verify after clean");
        assert!(!after_clean.all_present);

        pool.close().await;
    }
}
