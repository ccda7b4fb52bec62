//! Notifier trait for alert delivery.

use async_trait::async_trait;

use crate::error::NotificationError;

/// Delivers a rendered alert message.
///
/// Retry and backoff live inside the implementation; one call is one
/// logical attempt from the orchestrator's point of view.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotificationError>;
}
