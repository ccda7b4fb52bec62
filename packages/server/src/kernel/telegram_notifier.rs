//! Notifier implementations backed by the Telegram bot API.

use std::time::Duration;

use async_trait::async_trait;
use signal_pipeline::{NotificationError, Notifier};
use telegram::{ParseMode, TelegramService};

/// Sends alerts to one Telegram chat, retrying with exponential backoff.
pub struct TelegramNotifier {
    service: TelegramService,
    max_attempts: u32,
    base_delay: Duration,
}

impl TelegramNotifier {
    pub fn new(service: TelegramService) -> Self {
        Self {
            service,
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Delay before retry `n` (0-based) is `base_delay * 2^n`.
    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry `attempt` (0-based), saturating instead of overflowing.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Check the bot token against the API.
    pub async fn test_connection(&self) -> Result<String, NotificationError> {
        let me = self
            .service
            .get_me()
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;
        Ok(me.username.unwrap_or(me.first_name))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotificationError> {
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            match self.service.send_message(message, Some(ParseMode::Html)).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Telegram send failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(NotificationError::Delivery(last_error))
    }
}

/// Stand-in when alerts are switched off. Every send fails, so no posting
/// is ever marked as alerted.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _message: &str) -> Result<(), NotificationError> {
        tracing::debug!("Alerts disabled, skipping notification");
        Err(NotificationError::Disabled)
    }
}
