use thiserror::Error;

pub type Result<T> = std::result::Result<T, TelegramError>;

#[derive(Debug, Error)]
pub enum TelegramError {
    /// Transport failure. The request URL is stripped because it carries the bot token.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Telegram API error ({status}): {description}")]
    Api { status: u16, description: String },

    #[error("Telegram response had ok=true but no result")]
    MissingResult,
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Http(e.without_url())
    }
}
