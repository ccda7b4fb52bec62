//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the pipeline without
//! network calls or a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{NotificationError, PersistenceError, ProducerError, StoreResult};
use crate::stores::MemoryStore;
use crate::traits::{
    notifier::Notifier,
    producer::Producer,
    store::{JobStore, SignalStore},
};
use crate::types::job::{JobFilter, JobStats, PersistedJob, ScoredJob, UpsertOutcome};
use crate::types::raw::RawRecord;
use crate::types::signal::{Signal, SignalFilter};

/// A raw posting with the fields producers usually fill.
pub fn raw_job(title: &str, company: &str, location: &str, stack: &[&str]) -> RawRecord {
    RawRecord::new()
        .with("title", title)
        .with("company", company)
        .with("location", location)
        .with("stack", stack.to_vec())
        .with("url", format!("https://jobs.example/{}/{}", company, title).replace(' ', "-"))
        .with("posted_at", Utc::now())
}

/// A producer returning a configurable batch.
///
/// The batch can be swapped between runs to simulate a source changing.
pub struct MockProducer {
    name: String,
    records: RwLock<Vec<RawRecord>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockProducer {
    pub fn new(name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(records),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep before returning, to keep a run in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_records(&self, records: Vec<RawRecord>) {
        *self.records.write().unwrap() = records;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Producer for MockProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> Result<Vec<RawRecord>, ProducerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.records.read().unwrap().clone())
    }
}

/// A producer whose every call fails.
pub struct FailingProducer {
    name: String,
}

impl FailingProducer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Producer for FailingProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> Result<Vec<RawRecord>, ProducerError> {
        Err(ProducerError::Status {
            producer: self.name.clone(),
            status: 503,
        })
    }
}

/// Record of a call made to the mock notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MockNotifierCall {
    pub message: String,
    pub delivered: bool,
    pub at: DateTime<Utc>,
}

/// A notifier that records every message.
///
/// Individual calls (0-based) can be made to fail.
#[derive(Default)]
pub struct MockNotifier {
    calls: Arc<RwLock<Vec<MockNotifierCall>>>,
    failing_calls: HashSet<usize>,
    fail_all: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th call (0-based).
    pub fn failing_on(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    pub fn failing_always(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn calls(&self) -> Vec<MockNotifierCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Messages that were reported as delivered.
    pub fn delivered(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.delivered)
            .map(|c| c.message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, message: &str) -> Result<(), NotificationError> {
        let mut calls = self.calls.write().unwrap();
        let index = calls.len();
        let delivered = !(self.fail_all || self.failing_calls.contains(&index));
        calls.push(MockNotifierCall {
            message: message.to_string(),
            delivered,
            at: Utc::now(),
        });

        if delivered {
            Ok(())
        } else {
            Err(NotificationError::Delivery(format!("mock failure on call {}", index)))
        }
    }
}

/// A [`MemoryStore`] with injectable failures.
///
/// - listed ids fail individually inside a batch (the rest commit)
/// - `failing_commit` fails every batch as a whole (nothing commits)
/// - `failing_signals` fails signal writes
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_ids: HashSet<String>,
    fail_commit: bool,
    fail_signals: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_id(mut self, id: impl Into<String>) -> Self {
        self.failing_ids.insert(id.into());
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_signals(mut self) -> Self {
        self.fail_signals = true;
        self
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn upsert_batch(
        &self,
        jobs: &[ScoredJob],
    ) -> StoreResult<Vec<StoreResult<UpsertOutcome>>> {
        if self.fail_commit {
            return Err(PersistenceError::Transaction("injected commit failure".into()));
        }

        let accepted: Vec<ScoredJob> = jobs
            .iter()
            .filter(|j| !self.failing_ids.contains(j.id()))
            .cloned()
            .collect();
        let mut accepted_results = self.inner.upsert_batch(&accepted).await?.into_iter();

        Ok(jobs
            .iter()
            .map(|job| {
                if self.failing_ids.contains(job.id()) {
                    Err(PersistenceError::Backend(format!("injected failure for {}", job.id())))
                } else {
                    accepted_results.next().unwrap_or_else(|| {
                        Err(PersistenceError::Backend("missing batch result".into()))
                    })
                }
            })
            .collect())
    }

    async fn mark_alerted(&self, id: &str) -> StoreResult<()> {
        self.inner.mark_alerted(id).await
    }

    async fn find_job(&self, id: &str) -> StoreResult<Option<PersistedJob>> {
        self.inner.find_job(id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<PersistedJob>> {
        self.inner.list_jobs(filter).await
    }

    async fn delete_job(&self, id: &str) -> StoreResult<bool> {
        self.inner.delete_job(id).await
    }

    async fn job_stats(&self, threshold: u8, since: DateTime<Utc>) -> StoreResult<JobStats> {
        self.inner.job_stats(threshold, since).await
    }
}

#[async_trait]
impl SignalStore for FlakyStore {
    async fn record_signals(&self, signals: &[Signal]) -> StoreResult<usize> {
        if self.fail_signals {
            return Err(PersistenceError::Backend("injected signal failure".into()));
        }
        self.inner.record_signals(signals).await
    }

    async fn list_signals(&self, filter: &SignalFilter) -> StoreResult<Vec<Signal>> {
        self.inner.list_signals(filter).await
    }

    async fn find_signal(&self, id: &str) -> StoreResult<Option<Signal>> {
        self.inner.find_signal(id).await
    }

    async fn count_signals(&self) -> StoreResult<i64> {
        self.inner.count_signals().await
    }
}
