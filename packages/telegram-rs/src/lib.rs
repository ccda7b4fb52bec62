//! Minimal Telegram Bot API client.
//!
//! Covers what an alerting bot needs: posting a message to one chat and
//! checking that the token is valid.
//!
//! ```rust,ignore
//! use telegram::{ParseMode, TelegramOptions, TelegramService};
//!
//! let service = TelegramService::new(TelegramOptions::new(token, "@alerts"))?;
//! service.send_message("<b>hello</b>", Some(ParseMode::Html)).await?;
//! ```

pub mod error;
pub mod models;

pub use error::{Result, TelegramError};
pub use models::{Message, ParseMode, User};

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::models::{ApiResponse, SendMessageRequest};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TelegramOptions {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl TelegramOptions {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TelegramService {
    options: TelegramOptions,
    client: Client,
}

impl TelegramService {
    pub fn new(options: TelegramOptions) -> Result<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self { options, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.options.api_base.trim_end_matches('/'),
            self.options.bot_token,
            method
        )
    }

    /// Post `text` to the configured chat. Link previews are disabled.
    pub async fn send_message(&self, text: &str, parse_mode: Option<ParseMode>) -> Result<Message> {
        let body = SendMessageRequest {
            chat_id: &self.options.chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        let message: Message = Self::decode(response).await?;
        tracing::debug!(message_id = message.message_id, "Telegram message sent");
        Ok(message)
    }

    /// Identity of the bot behind the token.
    pub async fn get_me(&self) -> Result<User> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<ApiResponse<T>>(&text) {
            Ok(envelope) => envelope.into_result(status.as_u16()),
            Err(_) => Err(TelegramError::Api {
                status: status.as_u16(),
                description: text,
            }),
        }
    }
}
