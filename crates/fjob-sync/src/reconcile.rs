//! Time-driven deactivation of postings a source family has stopped returning.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fjob_storage::{JobStore, StoreError};
use tracing::info;

pub const DEFAULT_STALE_AFTER_DAYS: i64 = 14;

#[derive(Clone)]
pub struct StalenessReconciler {
    store: Arc<dyn JobStore>,
    source_family: String,
    stale_after: Duration,
}

impl StalenessReconciler {
    pub fn new(store: Arc<dyn JobStore>, source_family: impl Into<String>, stale_after: Duration) -> Self {
        Self {
            store,
            source_family: source_family.into(),
            stale_after,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.stale_after
    }

    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = self.cutoff(now);
        let deactivated = self
            .store
            .bulk_deactivate_stale(&self.source_family, cutoff)
            .await?;
        info!(source_family = %self.source_family, %cutoff, deactivated, "reconciled stale jobs");
        Ok(deactivated)
    }
}
