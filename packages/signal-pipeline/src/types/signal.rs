//! Signal types - derived trend, anomaly and spike observations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of derived observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Trend,
    Anomaly,
    Spike,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Trend => "trend",
            SignalType::Anomaly => "anomaly",
            SignalType::Spike => "spike",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trend" => Ok(SignalType::Trend),
            "anomaly" => Ok(SignalType::Anomaly),
            "spike" => Ok(SignalType::Spike),
            other => Err(format!("unknown signal type: {}", other)),
        }
    }
}

/// An append-only observation row.
///
/// Signals are never updated; every run that detects something writes new rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Fingerprint of type, title and detection time
    pub id: String,
    pub signal_type: SignalType,
    pub title: String,
    pub description: String,
    /// Structured detail (frequency tables, ratios)
    #[serde(default)]
    pub data: serde_json::Value,
    pub score: u8,
    pub detected_at: DateTime<Utc>,
    pub source: String,
}

impl Signal {
    pub fn new(
        signal_type: SignalType,
        title: impl Into<String>,
        description: impl Into<String>,
        score: u8,
        source: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let id = signal_id(signal_type, &title, detected_at);
        Self {
            id,
            signal_type,
            title,
            description: description.into(),
            data: serde_json::Value::Null,
            score,
            detected_at,
            source: source.into(),
        }
    }

    /// Fold a subject key into the id, so two subjects that render the same
    /// title at the same instant still get distinct rows.
    pub fn keyed_by(mut self, key: &str) -> Self {
        self.id = signal_id(
            self.signal_type,
            &format!("{}{}", self.title, key),
            self.detected_at,
        );
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Spike observation for a count that jumped against its history.
    pub fn spike(
        subject: &str,
        current_count: usize,
        historical_average: f64,
        source: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        let ratio = if historical_average > 0.0 {
            current_count as f64 / historical_average
        } else {
            0.0
        };
        Self::new(
            SignalType::Spike,
            format!("Posting spike: {}", subject),
            format!(
                "{} postings against a historical average of {:.1} ({:.2}x)",
                current_count, historical_average, ratio
            ),
            (ratio * 50.0).clamp(0.0, 100.0) as u8,
            source,
            detected_at,
        )
        .with_data(serde_json::json!({
            "current_count": current_count,
            "historical_average": historical_average,
            "ratio": ratio,
        }))
    }
}

/// md5 of `type + title + detected_at`, truncated to 16 hex chars.
pub fn signal_id(signal_type: SignalType, title: &str, detected_at: DateTime<Utc>) -> String {
    let input = format!(
        "{}{}{}",
        signal_type.as_str(),
        title,
        detected_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    let digest = format!("{:x}", md5::compute(input.as_bytes()));
    digest[..16].to_string()
}

/// Filters for listing stored signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalFilter {
    pub limit: u32,
    pub offset: u32,
    pub signal_type: Option<SignalType>,
    pub min_score: Option<u8>,
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            signal_type: None,
            min_score: None,
        }
    }
}

impl SignalFilter {
    pub fn matches(&self, signal: &Signal) -> bool {
        if let Some(kind) = self.signal_type {
            if signal.signal_type != kind {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            if signal.score < min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signal_ids_are_16_hex_and_time_dependent() {
        let t1 = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let t2 = t1 + chrono::Duration::milliseconds(1);

        let a = signal_id(SignalType::Trend, "Top keywords", t1);
        let b = signal_id(SignalType::Trend, "Top keywords", t1);
        let c = signal_id(SignalType::Trend, "Top keywords", t2);
        let d = signal_id(SignalType::Anomaly, "Top keywords", t1);

        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn signal_type_parses_case_insensitively() {
        assert_eq!("Anomaly".parse::<SignalType>(), Ok(SignalType::Anomaly));
        assert_eq!(" spike ".parse::<SignalType>(), Ok(SignalType::Spike));
        assert!("burst".parse::<SignalType>().is_err());
    }

    #[test]
    fn spike_signal_records_ratio() {
        let now = Utc::now();
        let signal = Signal::spike("remote rust roles", 30, 10.0, "trends", now);
        assert_eq!(signal.signal_type, SignalType::Spike);
        assert_eq!(signal.data["ratio"], serde_json::json!(3.0));
        assert_eq!(signal.score, 100);
    }

    #[test]
    fn filter_by_type_and_score() {
        let now = Utc::now();
        let trend = Signal::new(SignalType::Trend, "t", "", 0, "pipeline", now);
        let anomaly = Signal::new(SignalType::Anomaly, "a", "", 90, "pipeline", now);

        let filter = SignalFilter {
            signal_type: Some(SignalType::Anomaly),
            ..Default::default()
        };
        assert!(!filter.matches(&trend));
        assert!(filter.matches(&anomaly));

        let by_score = SignalFilter {
            min_score: Some(50),
            ..Default::default()
        };
        assert!(!by_score.matches(&trend));
        assert!(by_score.matches(&anomaly));
    }
}
