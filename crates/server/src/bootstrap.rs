use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

use tierline_core::config::{AppConfig, ConfigError, LoadOptions};
use tierline_db::{connect_with_settings, migrations, ClaimSet, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub claims: Arc<ClaimSet>,
}

/// Shared handler state: the pool plus the few config values the routes
/// actually need.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub claims: Arc<ClaimSet>,
    pub admin_token: Option<SecretString>,
    pub default_profile_id: Option<i64>,
    pub recompute_batch_size: u32,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState {
            db_pool: self.db_pool.clone(),
            claims: Arc::clone(&self.claims),
            admin_token: self.config.server.admin_token.clone(),
            default_profile_id: self.config.pricing.default_profile_id,
            recompute_batch_size: self.config.pricing.recompute_batch_size,
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    check_default_profile(&db_pool, config.pricing.default_profile_id).await?;

    Ok(Application { config, db_pool, claims: Arc::new(ClaimSet::default()) })
}

/// The fallback profile is resolved again on every recompute run; this check
/// only surfaces a misconfiguration at startup instead of on first use.
async fn check_default_profile(
    pool: &DbPool,
    default_profile_id: Option<i64>,
) -> Result<(), BootstrapError> {
    let Some(profile_id) = default_profile_id else {
        warn!(
            event_name = "system.bootstrap.no_default_profile",
            "pricing.default_profile_id is not configured; cost recompute will be unavailable"
        );
        return Ok(());
    };

    let exists: i64 =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pricing_profiles WHERE id = ?1)")
            .bind(profile_id)
            .fetch_one(pool)
            .await
            .map_err(BootstrapError::DatabaseConnect)?;

    if exists == 1 {
        info!(
            event_name = "system.bootstrap.default_profile_ok",
            profile_id, "fallback pricing profile found"
        );
    } else {
        warn!(
            event_name = "system.bootstrap.default_profile_missing",
            profile_id, "configured fallback pricing profile does not exist yet"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tierline_core::config::AppConfig;

    use super::bootstrap_with_config;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config
    }

    #[tokio::test]
    async fn bootstrap_connects_and_applies_migrations() {
        let app = bootstrap_with_config(memory_config()).await.expect("bootstrap");

        let table_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('pricing_profiles', 'orders', 'order_entries', 'cost_revisions')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should exist after bootstrap");
        assert_eq!(table_count, 4);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn missing_default_profile_is_tolerated_at_startup() {
        let mut config = memory_config();
        config.pricing.default_profile_id = Some(42);

        let app = bootstrap_with_config(config)
            .await
            .expect("a missing fallback profile must not block startup");
        assert_eq!(app.config.pricing.default_profile_id, Some(42));

        app.db_pool.close().await;
    }
}
