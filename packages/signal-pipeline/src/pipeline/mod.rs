//! Pipeline orchestration - the run state machine and its adapters.
//!
//! - [`orchestrator`]: one guarded end-to-end run
//! - [`state`]: run states
//! - [`alert`]: alert message rendering
//! - [`schedule`]: OS-thread scheduling adapter

pub mod alert;
pub mod orchestrator;
pub mod schedule;
pub mod state;

pub use alert::{escape_html, render_job_alert};
pub use orchestrator::{Orchestrator, PipelineConfig, RunOutcome, RunReport, SIGNAL_SOURCE};
pub use schedule::ThreadScheduler;
pub use state::PipelineState;
