//! One end-to-end pipeline run.
//!
//! ```text
//! Idle ─► Collecting ─► Processing ─► Persisting ─► Analyzing ─► Alerting ─► Idle
//!           │               │              │             │            │
//!       producers      normalize +    upsert batch   trend report   notifier +
//!     (concurrent)       score        (one tx)      (+ signals)    mark_alerted
//! ```
//!
//! Failures are isolated per producer, per item and per alert. Only a batch
//! transaction that cannot commit fails the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::normalize::Normalizer;
use crate::pipeline::alert::render_job_alert;
use crate::pipeline::state::{PipelineState, StateCell};
use crate::scoring::Scorer;
use crate::traits::{notifier::Notifier, producer::Producer, store::Repository};
use crate::trends::{TrendEngine, TrendReport};
use crate::types::job::ScoredJob;
use crate::types::raw::RawRecord;

/// Source recorded on signals written by the pipeline.
pub const SIGNAL_SOURCE: &str = "pipeline";

/// Knobs for a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Newly created jobs at or above this score are alerted
    pub alert_threshold: u8,

    /// Fixed delay between consecutive notifier calls
    pub alert_pacing: Duration,

    /// Write trend/anomaly signals after analysis
    pub persist_signals: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 70,
            alert_pacing: Duration::from_millis(500),
            persist_signals: true,
        }
    }
}

/// Counts and trend output of a completed run.
///
/// A run with partial failures still completes; the failure counters make
/// the degradation visible.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub states: Vec<PipelineState>,

    pub collected: usize,
    pub producer_failures: usize,
    pub processed: usize,
    pub normalization_failures: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub persist_failures: usize,
    pub candidates: usize,
    pub alerted: usize,
    pub alert_failures: usize,
    pub anomalies: usize,
    pub signals_recorded: usize,

    pub trends: TrendReport,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            states: Vec::with_capacity(PipelineState::RUN_SEQUENCE.len()),
            collected: 0,
            producer_failures: 0,
            processed: 0,
            normalization_failures: 0,
            created: 0,
            updated: 0,
            unchanged: 0,
            persist_failures: 0,
            candidates: 0,
            alerted: 0,
            alert_failures: 0,
            anomalies: 0,
            signals_recorded: 0,
            trends: TrendReport::default(),
        }
    }

    /// True when any producer, item or alert failed.
    pub fn is_degraded(&self) -> bool {
        self.producer_failures > 0
            || self.normalization_failures > 0
            || self.persist_failures > 0
            || self.alert_failures > 0
    }
}

/// What a trigger did.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Box<RunReport>),
    /// Another run held the guard; this trigger was dropped
    AlreadyRunning,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report.as_ref()),
            RunOutcome::AlreadyRunning => None,
        }
    }
}

/// Releases the run guard and returns to `Idle` however the run ends.
struct RunGuard<'a>(&'a Orchestrator);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Owned variant held by a spawned run; dropping the task releases it too.
struct OwnedRunGuard(Arc<Orchestrator>);

impl Drop for OwnedRunGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Drives pipeline runs. Share it behind an `Arc`; every trigger (timer,
/// thread, HTTP, CLI) calls [`Orchestrator::run_once`].
pub struct Orchestrator {
    producers: Vec<Arc<dyn Producer>>,
    normalizer: Normalizer,
    scorer: Scorer,
    trends: TrendEngine,
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
    running: AtomicBool,
    state: StateCell,
}

impl Orchestrator {
    pub fn new(
        repository: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
        scorer: Scorer,
    ) -> Self {
        Self {
            producers: Vec::new(),
            normalizer: Normalizer::new(),
            scorer,
            trends: TrendEngine::new(),
            repository,
            notifier,
            config: PipelineConfig::default(),
            running: AtomicBool::new(false),
            state: StateCell::new(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_producer(self, producer: impl Producer + 'static) -> Self {
        self.with_shared_producer(Arc::new(producer))
    }

    pub fn with_shared_producer(mut self, producer: Arc<dyn Producer>) -> Self {
        self.producers.push(producer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn producer_names(&self) -> Vec<String> {
        self.producers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Execute one run unless another is in progress.
    ///
    /// Cancellation is honoured until persisting starts. Once anything has
    /// been written the run goes on to analysis and alerting.
    pub async fn run_once(&self, cancel: &CancellationToken) -> PipelineResult<RunOutcome> {
        if !self.try_acquire() {
            return Ok(RunOutcome::AlreadyRunning);
        }
        let _guard = RunGuard(self);
        let report = self.run_guarded(cancel).await?;
        Ok(RunOutcome::Completed(Box::new(report)))
    }

    /// Claim the run guard on the calling task, then execute the run on a
    /// spawned one.
    ///
    /// `None` means another run holds the guard and nothing was spawned. A
    /// `Some` handle is always a run that will execute, never a dropped trigger.
    pub fn spawn_run(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<PipelineResult<Box<RunReport>>>> {
        if !self.try_acquire() {
            return None;
        }
        let guard = OwnedRunGuard(self.clone());

        Some(tokio::spawn(async move {
            let result = guard.0.run_guarded(&cancel).await;
            drop(guard);
            result.map(Box::new)
        }))
    }

    fn try_acquire(&self) -> bool {
        let acquired = self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !acquired {
            info!("Pipeline run already in progress, dropping trigger");
        }
        acquired
    }

    fn release(&self) {
        self.state.set(PipelineState::Idle);
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_guarded(&self, cancel: &CancellationToken) -> PipelineResult<RunReport> {
        let mut report = RunReport::new(Utc::now());
        info!(run_id = %report.run_id, producers = self.producers.len(), "Pipeline run started");

        self.enter(&mut report, PipelineState::Collecting);
        let raw = self.collect(cancel, &mut report).await?;

        self.enter(&mut report, PipelineState::Processing);
        let processed = self.process(raw, &mut report);

        if cancel.is_cancelled() {
            warn!(run_id = %report.run_id, "Pipeline run cancelled before persisting");
            return Err(PipelineError::Cancelled);
        }

        self.enter(&mut report, PipelineState::Persisting);
        let candidates = self.persist(&processed, &mut report).await?;

        self.enter(&mut report, PipelineState::Analyzing);
        self.analyze(&processed, &mut report).await;

        self.enter(&mut report, PipelineState::Alerting);
        self.alert(&candidates, &mut report).await;

        report.finished_at = Utc::now();
        info!(
            run_id = %report.run_id,
            collected = report.collected,
            processed = report.processed,
            created = report.created,
            updated = report.updated,
            candidates = report.candidates,
            alerted = report.alerted,
            degraded = report.is_degraded(),
            "Pipeline run complete"
        );
        Ok(report)
    }

    fn enter(&self, report: &mut RunReport, state: PipelineState) {
        debug!(run_id = %report.run_id, state = %state, "Entering state");
        self.state.set(state);
        report.states.push(state);
    }

    async fn collect(
        &self,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> PipelineResult<Vec<RawRecord>> {
        let calls = self.producers.iter().map(|producer| async move {
            (producer.name().to_string(), producer.collect().await)
        });

        let results = tokio::select! {
            results = join_all(calls) => results,
            _ = cancel.cancelled() => {
                warn!(run_id = %report.run_id, "Pipeline run cancelled while collecting");
                return Err(PipelineError::Cancelled);
            }
        };

        let mut raw = Vec::new();
        for (name, result) in results {
            match result {
                Ok(records) => {
                    info!(producer = %name, count = records.len(), "Producer finished");
                    raw.extend(records.into_iter().map(|mut record| {
                        record.insert_if_empty("source", name.as_str());
                        record
                    }));
                }
                Err(e) => {
                    error!(producer = %name, error = %e, "Producer failed");
                    report.producer_failures += 1;
                }
            }
        }

        report.collected = raw.len();
        Ok(raw)
    }

    fn process(&self, raw: Vec<RawRecord>, report: &mut RunReport) -> Vec<ScoredJob> {
        let now = Utc::now();
        let mut processed = Vec::with_capacity(raw.len());

        for record in &raw {
            match self.normalizer.normalize_at(record, now) {
                Ok(job) => {
                    let score = self.scorer.score_at(&job, now);
                    processed.push(job.scored(score));
                }
                Err(e) => {
                    warn!(error = %e, "Dropping record that failed normalization");
                    report.normalization_failures += 1;
                }
            }
        }

        report.processed = processed.len();
        processed
    }

    /// Upsert the batch; returns the alert candidates.
    async fn persist(
        &self,
        processed: &[ScoredJob],
        report: &mut RunReport,
    ) -> PipelineResult<Vec<ScoredJob>> {
        let results = self.repository.upsert_batch(processed).await.map_err(|e| {
            error!(run_id = %report.run_id, error = %e, "Batch transaction failed, run rolled back");
            PipelineError::Storage(e)
        })?;

        let mut candidates = Vec::new();
        for (job, result) in processed.iter().zip(results) {
            match result {
                Ok(outcome) if outcome.created => {
                    report.created += 1;
                    if job.score >= self.config.alert_threshold {
                        candidates.push(job.clone());
                    }
                }
                Ok(outcome) if outcome.changed => report.updated += 1,
                Ok(_) => report.unchanged += 1,
                Err(e) => {
                    error!(job_id = %job.id(), error = %e, "Failed to persist job");
                    report.persist_failures += 1;
                }
            }
        }

        report.candidates = candidates.len();
        Ok(candidates)
    }

    async fn analyze(&self, processed: &[ScoredJob], report: &mut RunReport) {
        let trends = self.trends.analyze(processed);
        report.anomalies = trends.anomalies.len();

        for anomaly in &trends.anomalies {
            info!(
                job_id = %anomaly.job.id(),
                score = anomaly.job.score,
                ratio = %format!("{:.1}", anomaly.ratio_to_mean),
                "High-value anomaly"
            );
        }

        if self.config.persist_signals {
            let signals = trends.signals(SIGNAL_SOURCE);
            if !signals.is_empty() {
                match self.repository.record_signals(&signals).await {
                    Ok(written) => report.signals_recorded = written,
                    Err(e) => error!(error = %e, "Failed to record signals"),
                }
            }
        }

        report.trends = trends;
    }

    async fn alert(&self, candidates: &[ScoredJob], report: &mut RunReport) {
        for (i, job) in candidates.iter().enumerate() {
            if i > 0 && !self.config.alert_pacing.is_zero() {
                tokio::time::sleep(self.config.alert_pacing).await;
            }

            let message = render_job_alert(job);
            match self.notifier.send(&message).await {
                Ok(()) => match self.repository.mark_alerted(job.id()).await {
                    Ok(()) => {
                        info!(job_id = %job.id(), score = job.score, "Alert sent");
                        report.alerted += 1;
                    }
                    Err(e) => {
                        error!(job_id = %job.id(), error = %e, "Alert sent but flag not recorded");
                        report.alert_failures += 1;
                    }
                },
                Err(e) => {
                    warn!(job_id = %job.id(), error = %e, "Alert delivery failed");
                    report.alert_failures += 1;
                }
            }
        }
    }
}
