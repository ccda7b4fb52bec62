//! Storage traits for jobs and signals.
//!
//! The storage layer is split into focused traits:
//! - `JobStore`: dedup-aware job upserts, the alerted flag, job queries
//! - `SignalStore`: append-only signal rows
//! - `Repository`: composite trait combining both

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{PersistenceError, StoreResult};
use crate::types::job::{JobFilter, JobStats, PersistedJob, ScoredJob, UpsertOutcome};
use crate::types::signal::{Signal, SignalFilter};

/// Persisted job postings keyed by id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Upsert a whole run's jobs in one transactional unit.
    ///
    /// The outer error means the unit could not commit and nothing was
    /// written. Inner errors are per-item: that item was skipped and the
    /// rest committed. Results are positional.
    ///
    /// An existing row only has its score (and `updated_at`) refreshed, and
    /// only when the score changed. `alerted` is never reset.
    async fn upsert_batch(
        &self,
        jobs: &[ScoredJob],
    ) -> StoreResult<Vec<StoreResult<UpsertOutcome>>>;

    /// Upsert a single job.
    async fn upsert(&self, job: &ScoredJob) -> StoreResult<UpsertOutcome> {
        let mut results = self.upsert_batch(std::slice::from_ref(job)).await?;
        results
            .pop()
            .unwrap_or_else(|| Err(PersistenceError::Backend("empty batch result".into())))
    }

    /// Set `alerted = true`. Idempotent; an unknown id is not an error.
    async fn mark_alerted(&self, id: &str) -> StoreResult<()>;

    async fn find_job(&self, id: &str) -> StoreResult<Option<PersistedJob>>;

    /// Ordered by score, then `posted_at`, both descending.
    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<PersistedJob>>;

    /// Returns whether a row was removed.
    async fn delete_job(&self, id: &str) -> StoreResult<bool>;

    /// Aggregates; `threshold` defines "high score", `since` defines "recent".
    async fn job_stats(&self, threshold: u8, since: DateTime<Utc>) -> StoreResult<JobStats>;
}

/// Append-only signal rows.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Insert signals; an id that already exists is skipped.
    ///
    /// Returns the number of rows written.
    async fn record_signals(&self, signals: &[Signal]) -> StoreResult<usize>;

    /// Newest first.
    async fn list_signals(&self, filter: &SignalFilter) -> StoreResult<Vec<Signal>>;

    async fn find_signal(&self, id: &str) -> StoreResult<Option<Signal>>;

    async fn count_signals(&self) -> StoreResult<i64>;
}

/// Composite storage trait used by the orchestrator.
pub trait Repository: JobStore + SignalStore {}

// Blanket implementation: anything implementing both traits is a Repository
impl<T: JobStore + SignalStore> Repository for T {}
