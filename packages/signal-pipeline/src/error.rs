//! Typed errors for the signal pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! an item-level failure from a run-level one.

use thiserror::Error;

/// A single raw record could not be turned into a canonical job.
///
/// Fatal to that item only; the run continues without it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizationError {
    /// No usable `id` and none of title/company/url to fingerprint
    #[error("cannot derive an identity: no id and no title, company or url")]
    MissingIdentity,

    /// A field carries a shape that cannot be interpreted
    #[error("field `{field}` has an unusable shape: {reason}")]
    InvalidField { field: String, reason: String },
}

/// A producer failed to deliver its batch.
///
/// Fatal to that producer's contribution only.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Transport-level failure (connection, timeout, TLS)
    #[error("request to {producer} failed: {source}")]
    Request {
        producer: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The source answered with a non-success status
    #[error("{producer} returned status {status}")]
    Status { producer: String, status: u16 },

    /// The payload could not be decoded
    #[error("could not decode {producer} payload: {reason}")]
    Decode { producer: String, reason: String },
}

/// Storage-layer failure.
///
/// Per-item inside a batch (the item is skipped) unless returned for the
/// batch as a whole, in which case the transaction did not commit.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Database driver error
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored row could not be mapped back to a domain value
    #[error("corrupt row for `{id}`: {reason}")]
    CorruptRow { id: String, reason: String },

    /// The batch transaction could not be started or committed
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Anything else the backend reports (lock poisoning, injected faults)
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(any(feature = "sqlite", feature = "postgres"))]
impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::Database(Box::new(err))
    }
}

/// A single notification attempt failed.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Alerts are switched off in configuration
    #[error("notifications are disabled")]
    Disabled,

    /// The transport rejected or could not deliver the message
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// The scoring rules document could not be used.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("cannot read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML rules: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON rules: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run-level failures. Everything item-scoped is absorbed into the run report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The storage transaction for the run could not commit; nothing was written
    #[error("run aborted, storage transaction failed: {0}")]
    Storage(#[from] PersistenceError),

    /// Cancellation arrived before any write happened
    #[error("run cancelled before persisting")]
    Cancelled,
}

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

/// Result type alias for pipeline runs.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
