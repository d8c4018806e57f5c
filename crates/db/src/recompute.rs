//! Batched, idempotent re-derivation of finalized entry costs.
//!
//! The job re-prices selected entries against the current tiers of the
//! profile that originally priced their order, falling back to a designated
//! default profile when that profile is gone or no longer validates. Each
//! batch writes in its own short transaction; one failed batch never aborts
//! its siblings, and every overwrite leaves a `cost_revisions` audit row.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use tierline_core::domain::profile::ProfileId;
use tierline_core::pricing::calculator::price;
use tierline_core::pricing::tier::{Tier, TierTable};
use tierline_core::recompute::{
    partition_batches, BatchOutcome, BatchStatus, CancelToken, EntryFailure, EntrySelector,
    RecomputeReport,
};

use crate::DbPool;

#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("a recompute run already targets {overlapping} of the selected entries")]
    Conflict { overlapping: usize },
    #[error("default pricing profile {id} is unusable: {reason}")]
    DefaultProfileUnavailable { id: i64, reason: String },
    #[error("datastore error: {0}")]
    Datastore(#[from] sqlx::Error),
}

/// Process-wide registry of entry ids currently being recomputed.
///
/// Two concurrent runs may never overlap on an entry; the second claimant is
/// rejected outright rather than queued.
#[derive(Default)]
pub struct ClaimSet {
    in_flight: Mutex<HashSet<i64>>,
}

impl ClaimSet {
    fn lock(&self) -> MutexGuard<'_, HashSet<i64>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claim every id or none: any overlap with an in-flight run fails the
    /// whole claim. The returned guard releases the ids on drop, so claims
    /// cannot leak past a failed run.
    pub fn try_claim(self: &Arc<Self>, entry_ids: &[i64]) -> Result<ClaimGuard, usize> {
        let mut in_flight = self.lock();
        let overlapping = entry_ids.iter().filter(|id| in_flight.contains(id)).count();
        if overlapping > 0 {
            return Err(overlapping);
        }

        in_flight.extend(entry_ids.iter().copied());
        Ok(ClaimGuard { set: Arc::clone(self), entry_ids: entry_ids.to_vec() })
    }
}

pub struct ClaimGuard {
    set: Arc<ClaimSet>,
    entry_ids: Vec<i64>,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let mut in_flight = self.set.lock();
        for id in &self.entry_ids {
            in_flight.remove(id);
        }
    }
}

struct EntryRow {
    allocation_gb: String,
    profile_id: i64,
}

#[derive(Default)]
struct BatchResult {
    written: usize,
    fallback: Vec<i64>,
    failures: Vec<EntryFailure>,
}

pub struct RecomputeJob {
    pool: DbPool,
    batch_size: usize,
    default_profile_id: ProfileId,
    claims: Arc<ClaimSet>,
}

impl RecomputeJob {
    pub fn new(
        pool: DbPool,
        batch_size: u32,
        default_profile_id: ProfileId,
        claims: Arc<ClaimSet>,
    ) -> Self {
        Self { pool, batch_size: batch_size.max(1) as usize, default_profile_id, claims }
    }

    /// Run one recompute pass over the selected entries.
    ///
    /// Raises only for selector-construction errors, an unusable default
    /// profile, overlapping concurrent runs, or datastore failure during the
    /// selection phase. Per-entry and per-batch failures are data in the
    /// report.
    pub async fn run(
        &self,
        selector: &EntrySelector,
        cancel: &CancelToken,
    ) -> Result<RecomputeReport, RecomputeError> {
        let default_table = self.load_default_table().await?;
        let rows = self.select_entries(selector).await?;

        let entry_ids: Vec<i64> = rows.keys().copied().collect();
        let mut sorted_ids = entry_ids;
        sorted_ids.sort_unstable();

        let _claim = self
            .claims
            .try_claim(&sorted_ids)
            .map_err(|overlapping| RecomputeError::Conflict { overlapping })?;

        let tables = self.load_referenced_tables(&rows).await?;

        let batches = partition_batches(&sorted_ids, self.batch_size);
        let mut report = RecomputeReport::empty(sorted_ids.len());

        info!(
            event_name = "pricing.recompute.started",
            selector = %selector.describe(),
            total_selected = report.total_selected,
            batch_count = batches.len(),
            "recompute run started"
        );

        for (index, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                report.batches.push(BatchOutcome {
                    index,
                    entry_ids: batch.clone(),
                    status: BatchStatus::Skipped,
                });
                continue;
            }

            match self.apply_batch(batch, &rows, &tables, &default_table).await {
                Ok(result) => {
                    report.succeeded += result.written;
                    report.fallback_used.extend(result.fallback);
                    report.failed.extend(result.failures);
                    report.batches.push(BatchOutcome {
                        index,
                        entry_ids: batch.clone(),
                        status: BatchStatus::Completed,
                    });
                }
                Err(error) => {
                    warn!(
                        event_name = "pricing.recompute.batch_failed",
                        batch_index = index,
                        entry_count = batch.len(),
                        error = %error,
                        "recompute batch rolled back"
                    );
                    for entry_id in batch {
                        report.failed.push(EntryFailure {
                            entry_id: *entry_id,
                            reason: format!("datastore: {error}"),
                        });
                    }
                    report.batches.push(BatchOutcome {
                        index,
                        entry_ids: batch.clone(),
                        status: BatchStatus::Failed,
                    });
                }
            }
        }

        info!(
            event_name = "pricing.recompute.finished",
            total_selected = report.total_selected,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            fallback_used = report.fallback_used.len(),
            "recompute run finished"
        );

        Ok(report)
    }

    async fn load_default_table(&self) -> Result<TierTable, RecomputeError> {
        let id = self.default_profile_id.0;
        let raw = self.load_tiers_json(id).await?.ok_or_else(|| {
            RecomputeError::DefaultProfileUnavailable { id, reason: "profile not found".to_string() }
        })?;

        table_from_json(&raw)
            .map_err(|reason| RecomputeError::DefaultProfileUnavailable { id, reason })
    }

    async fn load_tiers_json(&self, profile_id: i64) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT tiers_json FROM pricing_profiles WHERE id = ?1")
            .bind(profile_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn select_entries(
        &self,
        selector: &EntrySelector,
    ) -> Result<HashMap<i64, EntryRow>, RecomputeError> {
        const BASE: &str = "SELECT e.id, e.allocation_gb, o.pricing_profile_id
             FROM order_entries e JOIN orders o ON o.id = e.order_id";

        let rows: Vec<(i64, String, i64)> = match selector {
            EntrySelector::All => {
                sqlx::query_as(&format!("{BASE} ORDER BY e.id")).fetch_all(&self.pool).await?
            }
            EntrySelector::ByOrderIds(order_ids) => {
                if order_ids.is_empty() {
                    return Err(RecomputeError::InvalidSelector(
                        "order id list is empty".to_string(),
                    ));
                }
                // Integer ids formatted inline; no user-controlled text.
                let id_list =
                    order_ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
                sqlx::query_as(&format!("{BASE} WHERE e.order_id IN ({id_list}) ORDER BY e.id"))
                    .fetch_all(&self.pool)
                    .await?
            }
            EntrySelector::ByStatus(status) => {
                sqlx::query_as(&format!("{BASE} WHERE e.status = ?1 ORDER BY e.id"))
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|(id, allocation_gb, profile_id)| (id, EntryRow { allocation_gb, profile_id }))
            .collect())
    }

    /// Resolve the current tier table for every profile the selected orders
    /// reference. Missing or invalid profiles resolve to `None` and will be
    /// priced under the default table, recorded as fallback in the report.
    async fn load_referenced_tables(
        &self,
        rows: &HashMap<i64, EntryRow>,
    ) -> Result<HashMap<i64, Option<TierTable>>, RecomputeError> {
        let profile_ids: HashSet<i64> = rows.values().map(|row| row.profile_id).collect();

        let mut tables = HashMap::with_capacity(profile_ids.len());
        for profile_id in profile_ids {
            let resolved = match self.load_tiers_json(profile_id).await? {
                None => {
                    warn!(
                        event_name = "pricing.recompute.profile_missing",
                        profile_id, "referenced profile deleted, default profile will be used"
                    );
                    None
                }
                Some(raw) => match table_from_json(&raw) {
                    Ok(table) => Some(table),
                    Err(reason) => {
                        warn!(
                            event_name = "pricing.recompute.profile_invalid",
                            profile_id,
                            reason = %reason,
                            "referenced profile failed validation, default profile will be used"
                        );
                        None
                    }
                },
            };
            tables.insert(profile_id, resolved);
        }

        Ok(tables)
    }

    async fn apply_batch(
        &self,
        batch: &[i64],
        rows: &HashMap<i64, EntryRow>,
        tables: &HashMap<i64, Option<TierTable>>,
        default_table: &TierTable,
    ) -> Result<BatchResult, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut result = BatchResult::default();
        let recorded_at = Utc::now();

        for entry_id in batch {
            let Some(row) = rows.get(entry_id) else {
                continue;
            };

            let (table, fallback) = match tables.get(&row.profile_id).and_then(Option::as_ref) {
                Some(table) => (table, false),
                None => (default_table, true),
            };

            let allocation: Decimal = match row.allocation_gb.parse() {
                Ok(value) => value,
                Err(_) => {
                    result.failures.push(EntryFailure {
                        entry_id: *entry_id,
                        reason: format!("undecodable allocation `{}`", row.allocation_gb),
                    });
                    continue;
                }
            };

            let new_cost = match price(allocation, table) {
                Ok(cost) => cost,
                Err(error) => {
                    result.failures.push(EntryFailure {
                        entry_id: *entry_id,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            // Read the prior cost inside the write transaction: a run that
            // completed between selection and this batch must not leave a
            // stale old_cost in the audit row.
            let old_cost: Option<String> = match sqlx::query_scalar(
                "SELECT cost FROM order_entries WHERE id = ?1",
            )
            .bind(*entry_id)
            .fetch_optional(&mut *tx)
            .await?
            {
                Some(current) => current,
                None => {
                    result.failures.push(EntryFailure {
                        entry_id: *entry_id,
                        reason: "entry no longer exists".to_string(),
                    });
                    continue;
                }
            };

            sqlx::query("UPDATE order_entries SET cost = ?1 WHERE id = ?2")
                .bind(new_cost.to_string())
                .bind(*entry_id)
                .execute(&mut *tx)
                .await?;

            let profile_used =
                if fallback { self.default_profile_id.0 } else { row.profile_id };
            sqlx::query(
                "INSERT INTO cost_revisions (entry_id, old_cost, new_cost, pricing_profile_id, fallback, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(*entry_id)
            .bind(old_cost.as_deref())
            .bind(new_cost.to_string())
            .bind(profile_used)
            .bind(fallback)
            .bind(recorded_at)
            .execute(&mut *tx)
            .await?;

            if fallback {
                result.fallback.push(*entry_id);
            }
            result.written += 1;
        }

        tx.commit().await?;
        Ok(result)
    }
}

fn table_from_json(raw: &str) -> Result<TierTable, String> {
    let tiers: Vec<Tier> =
        serde_json::from_str(raw).map_err(|error| format!("undecodable tiers_json: {error}"))?;
    TierTable::validate(tiers).map_err(|error| error.to_string())
}
