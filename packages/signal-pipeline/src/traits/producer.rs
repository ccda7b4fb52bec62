//! Producer trait for pluggable job sources.

use async_trait::async_trait;

use crate::error::ProducerError;
use crate::types::raw::RawRecord;

/// A source of raw job postings.
///
/// `collect` returns one finite batch per call. Timeouts and retries are the
/// producer's own business; the orchestrator only sees success or failure.
///
/// ```rust,ignore
/// struct Board;
///
/// #[async_trait]
/// impl Producer for Board {
///     fn name(&self) -> &str { "board" }
///
///     async fn collect(&self) -> Result<Vec<RawRecord>, ProducerError> {
///         Ok(vec![RawRecord::new().with("title", "Rust Engineer")])
///     }
/// }
/// ```
#[async_trait]
pub trait Producer: Send + Sync {
    /// Stable name, used as the default `source` of collected records.
    fn name(&self) -> &str;

    async fn collect(&self) -> Result<Vec<RawRecord>, ProducerError>;
}
