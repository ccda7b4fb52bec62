//! Scheduled pipeline runs using tokio-cron-scheduler.
//!
//! ```text
//! startup ──► run_scheduled()            (immediately)
//! Scheduler (every COLLECTOR_INTERVAL_MINUTES)
//!     └─► run_scheduled()
//!             └─► Orchestrator::run_once  (dropped if a run is in flight)
//! ```
//!
//! The HTTP collect endpoint and the CLI go through the same
//! `Orchestrator::run_once`, so at most one run executes at a time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use signal_pipeline::{Orchestrator, PipelineResult, RunOutcome};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

/// Start the recurring collection job plus one run right away.
pub async fn start_scheduler(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<JobScheduler> {
    ensure!(!interval.is_zero(), "Collector interval must be greater than zero");
    let scheduler = JobScheduler::new().await?;

    let job_orchestrator = orchestrator.clone();
    let job_cancel = cancel.clone();
    let collect_job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let orchestrator = job_orchestrator.clone();
        let cancel = job_cancel.clone();
        Box::pin(async move {
            run_scheduled(&orchestrator, &cancel).await;
        })
    })?;

    scheduler.add(collect_job).await?;
    scheduler.start().await?;

    tracing::info!(
        interval_minutes = interval.as_secs() / 60,
        "Scheduled tasks started (pipeline run on startup and every interval)"
    );

    tokio::spawn(async move {
        run_scheduled(&orchestrator, &cancel).await;
    });

    Ok(scheduler)
}

/// Run the pipeline once and log the outcome. Never fails; errors are logged.
pub async fn run_scheduled(orchestrator: &Orchestrator, cancel: &CancellationToken) {
    log_outcome(orchestrator.run_once(cancel).await);
}

fn log_outcome(outcome: PipelineResult<RunOutcome>) {
    match outcome {
        Ok(RunOutcome::Completed(report)) => {
            tracing::info!(
                run_id = %report.run_id,
                created = report.created,
                updated = report.updated,
                alerted = report.alerted,
                degraded = report.is_degraded(),
                "Scheduled run finished"
            );
        }
        Ok(RunOutcome::AlreadyRunning) => {
            tracing::info!("Skipping scheduled run, previous run still in progress");
        }
        Err(e) => tracing::error!(error = %e, "Scheduled run failed"),
    }
}

/// Start a run in the background.
///
/// The run guard is taken before this returns, so `true` always means a run
/// is executing. Returns false when a run is already in progress.
pub fn trigger_background_run(orchestrator: &Arc<Orchestrator>, cancel: CancellationToken) -> bool {
    let Some(handle) = orchestrator.spawn_run(cancel) else {
        return false;
    };
    tokio::spawn(async move {
        match handle.await {
            Ok(result) => log_outcome(result.map(RunOutcome::Completed)),
            Err(e) => tracing::error!(error = %e, "Background run task failed"),
        }
    });
    true
}
