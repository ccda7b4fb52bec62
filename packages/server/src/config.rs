use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use signal_pipeline::{PipelineConfig, ScoringRules};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub enable_alerts: bool,
    pub alert_threshold: u8,
    pub alert_pacing_ms: u64,
    pub rules_file: PathBuf,
    /// Overrides `max_age_days` from the rules document when set
    pub max_age_days: Option<i64>,
    pub collector_interval_minutes: u64,
    pub use_sample_collectors: bool,
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://signalforge.db?mode=rwc".to_string()),
            telegram_token: non_empty("TELEGRAM_TOKEN"),
            telegram_chat_id: non_empty("TELEGRAM_CHAT_ID"),
            enable_alerts: parse_bool(non_empty("ENABLE_ALERTS").as_deref()),
            alert_threshold: parse_or("ALERT_THRESHOLD", non_empty("ALERT_THRESHOLD"), 70)?,
            alert_pacing_ms: parse_or("ALERT_PACING_MS", non_empty("ALERT_PACING_MS"), 500)?,
            rules_file: non_empty("RULES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("rules/job_rules.toml")),
            max_age_days: non_empty("MAX_AGE_DAYS")
                .map(|v| v.trim().parse().context("MAX_AGE_DAYS must be a valid number"))
                .transpose()?,
            collector_interval_minutes: parse_or(
                "COLLECTOR_INTERVAL_MINUTES",
                non_empty("COLLECTOR_INTERVAL_MINUTES"),
                60,
            )?,
            use_sample_collectors: parse_bool(non_empty("USE_SAMPLE_COLLECTORS").as_deref()),
            api_host: non_empty("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_or("API_PORT", non_empty("API_PORT"), 8000)?,
        })
    }

    /// Reject combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.enable_alerts && self.telegram_token.is_none() {
            errors.push("TELEGRAM_TOKEN is required when alerts are enabled (set ENABLE_ALERTS=false to disable)");
        }
        if self.enable_alerts && self.telegram_chat_id.is_none() {
            errors.push("TELEGRAM_CHAT_ID is required when alerts are enabled");
        }
        if self.alert_threshold > 100 {
            errors.push("ALERT_THRESHOLD must be between 0 and 100");
        }
        if self.collector_interval_minutes == 0 {
            errors.push("COLLECTOR_INTERVAL_MINUTES must be greater than 0");
        }

        if !errors.is_empty() {
            bail!("Configuration errors: {}", errors.join(", "));
        }
        Ok(())
    }

    pub fn is_postgres(&self) -> bool {
        self.database_url.starts_with("postgres://") || self.database_url.starts_with("postgresql://")
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            alert_threshold: self.alert_threshold,
            alert_pacing: Duration::from_millis(self.alert_pacing_ms),
            persist_signals: true,
        }
    }

    /// Rules document with the `MAX_AGE_DAYS` override applied.
    pub fn scoring_rules(&self) -> ScoringRules {
        let mut rules = ScoringRules::load(&self.rules_file);
        if let Some(days) = self.max_age_days {
            rules.max_age_days = days;
        }
        rules
    }

    pub fn collector_interval(&self) -> Duration {
        Duration::from_secs(self.collector_interval_minutes.saturating_mul(60))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parse_bool(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got {:?}", name, v)),
        None => Ok(default),
    }
}
