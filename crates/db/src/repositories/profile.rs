use chrono::{DateTime, Utc};

use tierline_core::domain::profile::{PricingProfile, ProfileId};
use tierline_core::pricing::tier::{Tier, TierTable};

use super::{ProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn tiers_to_json(tiers: &TierTable) -> Result<String, RepositoryError> {
    serde_json::to_string(tiers.tiers())
        .map_err(|error| RepositoryError::Decode(format!("could not encode tiers: {error}")))
}

fn tiers_from_json(raw: &str) -> Result<Vec<Tier>, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("could not decode tiers_json: {error}")))
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_by_id(&self, id: ProfileId) -> Result<Option<PricingProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
            "SELECT id, name, tiers_json, created_at FROM pricing_profiles WHERE id = ?1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, name, tiers_json, created_at)) = row else {
            return Ok(None);
        };

        Ok(Some(PricingProfile {
            id: ProfileId(id),
            name,
            tiers: tiers_from_json(&tiers_json)?,
            created_at,
        }))
    }

    async fn create(
        &self,
        name: &str,
        tiers: &TierTable,
    ) -> Result<PricingProfile, RepositoryError> {
        let created_at = Utc::now();
        let tiers_json = tiers_to_json(tiers)?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO pricing_profiles (name, tiers_json, created_at)
             VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(name)
        .bind(&tiers_json)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(PricingProfile {
            id: ProfileId(id),
            name: name.to_string(),
            tiers: tiers.tiers().to_vec(),
            created_at,
        })
    }

    async fn rename(&self, id: ProfileId, name: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE pricing_profiles SET name = ?1 WHERE id = ?2")
            .bind(name)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_tiers(
        &self,
        id: ProfileId,
        tiers: &TierTable,
    ) -> Result<bool, RepositoryError> {
        let tiers_json = tiers_to_json(tiers)?;
        let result = sqlx::query("UPDATE pricing_profiles SET tiers_json = ?1 WHERE id = ?2")
            .bind(&tiers_json)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: ProfileId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM pricing_profiles WHERE id = ?1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use tierline_core::pricing::tier::{Tier, TierTable};

    use crate::repositories::ProfileRepository;
    use crate::{connect_with_settings, migrations};

    use super::SqlProfileRepository;

    fn flat_table() -> TierTable {
        TierTable::validate(vec![Tier {
            floor_units: Decimal::ZERO,
            ceiling_units: None,
            unit_price: Decimal::new(25, 2),
        }])
        .expect("valid table")
    }

    #[tokio::test]
    async fn create_find_rename_delete_round_trip() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let repo = SqlProfileRepository::new(pool.clone());
        let created = repo.create("Flat Rate", &flat_table()).await.expect("create");

        let found = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(found.name, "Flat Rate");
        assert_eq!(found.tiers, created.tiers);

        assert!(repo.rename(created.id, "Flat Rate v2").await.expect("rename"));
        let renamed = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(renamed.name, "Flat Rate v2");
        assert_eq!(renamed.tiers, created.tiers, "rename must not touch tiers");

        assert!(repo.delete(created.id).await.expect("delete"));
        assert!(repo.find_by_id(created.id).await.expect("find").is_none());

        pool.close().await;
    }

    #[tokio::test]
    async fn stored_tiers_survive_a_json_round_trip_and_revalidate() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let repo = SqlProfileRepository::new(pool.clone());
        let table = TierTable::validate(vec![
            Tier {
                floor_units: Decimal::ZERO,
                ceiling_units: Some(Decimal::from(100)),
                unit_price: Decimal::ONE,
            },
            Tier {
                floor_units: Decimal::from(100),
                ceiling_units: None,
                unit_price: Decimal::new(50, 2),
            },
        ])
        .expect("valid table");

        let created = repo.create("Tiered", &table).await.expect("create");
        let loaded = repo.find_by_id(created.id).await.expect("find").expect("exists");

        let revalidated = loaded.tier_table().expect("stored tiers still validate");
        assert_eq!(revalidated.tiers(), table.tiers());

        pool.close().await;
    }
}
