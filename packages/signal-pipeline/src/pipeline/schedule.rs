//! OS-thread scheduling adapter.
//!
//! Runs the orchestrator on a dedicated thread with its own current-thread
//! runtime, ticking on a fixed period. The first tick fires immediately.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::orchestrator::{Orchestrator, RunOutcome};

/// Handle to a background scheduling thread.
///
/// Dropping the handle cancels the thread without waiting for it; call
/// [`ThreadScheduler::shutdown`] to wait for the current run to finish.
pub struct ThreadScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ThreadScheduler {
    /// Fails with `InvalidInput` on a zero period.
    pub fn spawn(orchestrator: Arc<Orchestrator>, period: Duration) -> std::io::Result<Self> {
        if period.is_zero() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "scheduler period must be greater than zero",
            ));
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = std::thread::Builder::new()
            .name("signal-pipeline-scheduler".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "Failed to build scheduler runtime");
                        return;
                    }
                };
                runtime.block_on(tick_loop(orchestrator, period, token));
            })?;

        info!(period_secs = period.as_secs_f64(), "Thread scheduler started");
        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Cancel and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Scheduler thread panicked");
            }
        }
        info!("Thread scheduler stopped");
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn tick_loop(orchestrator: Arc<Orchestrator>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match orchestrator.run_once(&cancel).await {
                    Ok(RunOutcome::Completed(report)) => {
                        info!(run_id = %report.run_id, created = report.created, "Scheduled run finished");
                    }
                    Ok(RunOutcome::AlreadyRunning) => {}
                    Err(e) => error!(error = %e, "Scheduled run failed"),
                }
            }
        }
    }
}
