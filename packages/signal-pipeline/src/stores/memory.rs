//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::error::{PersistenceError, StoreResult};
use crate::traits::store::{JobStore, SignalStore};
use crate::types::job::{
    CountEntry, JobFilter, JobStats, PersistedJob, ScoredJob, UpsertOutcome,
};
use crate::types::signal::{Signal, SignalFilter};

/// In-memory storage for jobs and signals.
///
/// A batch is applied to a copy of the job table and swapped in at the end,
/// so readers never observe a half-applied run. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, PersistedJob>>,
    signals: RwLock<Vec<Signal>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            signals: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.read().map(|j| j.len()).unwrap_or(0)
    }

    /// Number of stored signals.
    pub fn signal_count(&self) -> usize {
        self.signals.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.clear();
        }
        if let Ok(mut signals) = self.signals.write() {
            signals.clear();
        }
    }

    fn jobs_read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, PersistedJob>>> {
        self.jobs.read().map_err(|e| PersistenceError::Backend(e.to_string()))
    }

    fn jobs_write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, PersistedJob>>> {
        self.jobs.write().map_err(|e| PersistenceError::Backend(e.to_string()))
    }

    fn signals_read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<Signal>>> {
        self.signals.read().map_err(|e| PersistenceError::Backend(e.to_string()))
    }

    fn signals_write(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<Signal>>> {
        self.signals.write().map_err(|e| PersistenceError::Backend(e.to_string()))
    }
}

/// Apply one upsert to a job table.
pub(crate) fn apply_upsert(
    table: &mut HashMap<String, PersistedJob>,
    job: &ScoredJob,
    now: DateTime<Utc>,
) -> UpsertOutcome {
    match table.get_mut(job.id()) {
        None => {
            table.insert(job.id().to_string(), PersistedJob::from_scored(job, now));
            UpsertOutcome::CREATED
        }
        Some(existing) if existing.score != job.score => {
            existing.score = job.score;
            existing.updated_at = now;
            UpsertOutcome::RESCORED
        }
        Some(_) => UpsertOutcome::UNCHANGED,
    }
}

/// Stats over a set of rows, mirroring the SQL aggregation.
pub(crate) fn compute_stats<'a>(
    jobs: impl Iterator<Item = &'a PersistedJob>,
    threshold: u8,
    since: DateTime<Utc>,
) -> JobStats {
    let mut stats = JobStats::default();
    let mut companies: HashMap<&str, i64> = HashMap::new();
    let mut locations: HashMap<&str, i64> = HashMap::new();

    for job in jobs {
        stats.total_jobs += 1;
        if job.score >= threshold {
            stats.high_score_jobs += 1;
        }
        if job.alerted {
            stats.alerted_jobs += 1;
        }
        if job.posted_at >= since {
            stats.recent_jobs += 1;
        }
        *companies.entry(job.company.as_str()).or_default() += 1;
        *locations.entry(job.location.as_str()).or_default() += 1;
    }

    stats.top_companies = top_counts(companies);
    stats.top_locations = top_counts(locations);
    stats
}

fn top_counts(counts: HashMap<&str, i64>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(value, count)| CountEntry {
            value: value.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries.truncate(10);
    entries
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn upsert_batch(
        &self,
        jobs: &[ScoredJob],
    ) -> StoreResult<Vec<StoreResult<UpsertOutcome>>> {
        let mut guard = self.jobs_write()?;
        let mut working = guard.clone();
        let now = Utc::now();

        let results = jobs
            .iter()
            .map(|job| Ok(apply_upsert(&mut working, job, now)))
            .collect();

        *guard = working;
        Ok(results)
    }

    async fn mark_alerted(&self, id: &str) -> StoreResult<()> {
        if let Some(job) = self.jobs_write()?.get_mut(id) {
            job.alerted = true;
        }
        Ok(())
    }

    async fn find_job(&self, id: &str) -> StoreResult<Option<PersistedJob>> {
        Ok(self.jobs_read()?.get(id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<PersistedJob>> {
        let jobs = self.jobs_read()?;
        let mut matching: Vec<PersistedJob> =
            jobs.values().filter(|j| filter.matches(j)).cloned().collect();

        matching.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.posted_at.cmp(&a.posted_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn delete_job(&self, id: &str) -> StoreResult<bool> {
        Ok(self.jobs_write()?.remove(id).is_some())
    }

    async fn job_stats(&self, threshold: u8, since: DateTime<Utc>) -> StoreResult<JobStats> {
        let jobs = self.jobs_read()?;
        Ok(compute_stats(jobs.values(), threshold, since))
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn record_signals(&self, signals: &[Signal]) -> StoreResult<usize> {
        let mut stored = self.signals_write()?;
        let mut written = 0;
        for signal in signals {
            if stored.iter().any(|s| s.id == signal.id) {
                warn!(signal_id = %signal.id, title = %signal.title, "Signal id already recorded, skipping");
                continue;
            }
            stored.push(signal.clone());
            written += 1;
        }
        Ok(written)
    }

    async fn list_signals(&self, filter: &SignalFilter) -> StoreResult<Vec<Signal>> {
        let stored = self.signals_read()?;
        let mut matching: Vec<Signal> =
            stored.iter().filter(|s| filter.matches(s)).cloned().collect();
        matching.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));

        Ok(matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn find_signal(&self, id: &str) -> StoreResult<Option<Signal>> {
        Ok(self.signals_read()?.iter().find(|s| s.id == id).cloned())
    }

    async fn count_signals(&self) -> StoreResult<i64> {
        Ok(self.signals_read()?.len() as i64)
    }
}
