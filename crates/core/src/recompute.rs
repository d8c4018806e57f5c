//! Selector, report, and cancellation types for bulk cost recomputation.
//!
//! The orchestration itself lives next to the datastore; these types are the
//! pure contract it exposes: what was targeted, what succeeded, where the
//! fallback profile had to stand in, and which batches ran.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::order::EntryStatus;

/// Scope of a recompute run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySelector {
    All,
    ByOrderIds(Vec<i64>),
    ByStatus(EntryStatus),
}

impl EntrySelector {
    pub fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::ByOrderIds(ids) => format!("{} order id(s)", ids.len()),
            Self::ByStatus(status) => format!("status={}", status.as_str()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub entry_id: i64,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub index: usize,
    pub entry_ids: Vec<i64>,
    pub status: BatchStatus,
}

/// The sole side-channel for partial failure: per-entry failures and
/// fallback uses are data here, never raised as errors by the job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub total_selected: usize,
    pub succeeded: usize,
    pub failed: Vec<EntryFailure>,
    pub fallback_used: Vec<i64>,
    pub batches: Vec<BatchOutcome>,
}

impl RecomputeReport {
    pub fn empty(total_selected: usize) -> Self {
        Self { total_selected, ..Self::default() }
    }
}

/// Cooperative cancellation checked between batches: the in-flight batch
/// finishes, remaining batches are reported as skipped.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Partition entry ids into fixed-size batches so each underlying
/// transaction stays short. A zero batch size is treated as one.
pub fn partition_batches(entry_ids: &[i64], batch_size: usize) -> Vec<Vec<i64>> {
    entry_ids.chunks(batch_size.max(1)).map(|chunk| chunk.to_vec()).collect()
}
