//! Job-Posting Signal Pipeline
//!
//! Ingests raw job postings from pluggable producers, reduces them to a
//! canonical record, scores them against a declarative rule set, persists
//! them deduplicated, detects trends and anomalies, and alerts exactly once
//! per qualifying posting.
//!
//! # Flow
//!
//! ```text
//! producers ─► Normalizer ─► Scorer ─► Repository (upsert) ─► TrendEngine
//!                                                     │
//!                                  alert candidates ◄─┘ ─► Notifier ─► mark_alerted
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use signal_pipeline::{MemoryStore, Orchestrator, Scorer, ScoringRules};
//! use signal_pipeline::testing::{MockNotifier, MockProducer};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockNotifier::new()),
//!     Scorer::new(ScoringRules::load("rules/job_rules.toml")),
//! )
//! .with_producer(MockProducer::new("board", records));
//!
//! let outcome = orchestrator.run_once(&CancellationToken::new()).await?;
//! ```
//!
//! # Modules
//!
//! - [`types`] - Raw records, canonical/persisted jobs, signals
//! - [`normalize`] - Identity derivation and field cleanup
//! - [`scoring`] - Weighted scoring and rule documents
//! - [`trends`] - Frequency tables, anomalies, spikes
//! - [`traits`] - Producer, Notifier and storage seams
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore, PostgresStore)
//! - [`pipeline`] - Orchestrator state machine and scheduling adapter
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod scoring;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod trends;
pub mod types;

// Re-export core types at crate root
pub use error::{
    NormalizationError, NotificationError, PersistenceError, PipelineError, PipelineResult,
    ProducerError, RulesError, StoreResult,
};
pub use normalize::Normalizer;
pub use pipeline::{
    render_job_alert, Orchestrator, PipelineConfig, PipelineState, RunOutcome, RunReport,
    ThreadScheduler,
};
pub use scoring::{ScoreBreakdown, Scorer, ScoringRules, Weights};
pub use traits::{
    notifier::Notifier,
    producer::Producer,
    store::{JobStore, Repository, SignalStore},
};
pub use trends::{is_spike, Anomaly, AnomalyKind, TrendEngine, TrendReport};
pub use types::{
    job::{
        CanonicalJob, CountEntry, JobFilter, JobStats, PersistedJob, ScoredJob, UpsertOutcome,
    },
    raw::{RawRecord, RawValue},
    signal::{Signal, SignalFilter, SignalType},
};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;

// Re-export for callers driving `run_once`
pub use tokio_util::sync::CancellationToken;
