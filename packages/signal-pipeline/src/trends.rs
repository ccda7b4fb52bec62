//! Trend and anomaly detection over a scored batch.
//!
//! Frequency tables keep first-seen order for ties, so two runs over the same
//! batch produce identical reports.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::job::{CountEntry, ScoredJob};
use crate::types::signal::{Signal, SignalType};

/// Entries kept per frequency table.
pub const TOP_N: usize = 10;
/// Window for `recent_count`.
pub const RECENT_WINDOW_DAYS: i64 = 3;
/// An anomaly must exceed this score regardless of the batch mean.
pub const ANOMALY_SCORE_FLOOR: u8 = 60;
/// An anomaly must reach this multiple of the batch mean.
pub const ANOMALY_MEAN_MULTIPLIER: f64 = 2.0;
/// Default ratio for [`is_spike`].
pub const DEFAULT_SPIKE_THRESHOLD: f64 = 1.5;

const TECH_VOCABULARY: &[&str] = &[
    "ai",
    "ml",
    "machine learning",
    "artificial intelligence",
    "python",
    "javascript",
    "typescript",
    "go",
    "rust",
    "react",
    "vue",
    "angular",
    "nextjs",
    "aws",
    "azure",
    "gcp",
    "kubernetes",
    "docker",
    "blockchain",
    "web3",
    "crypto",
    "data science",
    "data engineering",
    "devops",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    HighValue,
}

/// A posting whose score stands out from its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub job: ScoredJob,
    pub ratio_to_mean: f64,
    pub reason: String,
    pub detected_at: DateTime<Utc>,
}

/// Frequency tables and anomalies for one batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendReport {
    pub top_technologies: Vec<CountEntry>,
    pub trending_keywords: Vec<CountEntry>,
    pub top_hiring_companies: Vec<CountEntry>,
    pub top_locations: Vec<CountEntry>,
    pub recent_count: usize,
    pub total_analyzed: usize,
    pub mean_score: f64,
    pub anomalies: Vec<Anomaly>,
    pub analyzed_at: DateTime<Utc>,
}

impl TrendReport {
    pub fn is_empty(&self) -> bool {
        self.total_analyzed == 0
    }

    /// Append-only signal rows for this report.
    ///
    /// One trend signal for a non-empty batch plus one anomaly signal per
    /// anomaly. Spikes are never derived here.
    pub fn signals(&self, source: &str) -> Vec<Signal> {
        let mut signals = Vec::with_capacity(self.anomalies.len() + 1);

        if !self.is_empty() {
            let description = format!(
                "{} postings analyzed, {} recent. Top technologies: {}. Trending keywords: {}.",
                self.total_analyzed,
                self.recent_count,
                join_values(&self.top_technologies, 5),
                join_values(&self.trending_keywords, 5),
            );
            let data = serde_json::json!({
                "top_technologies": self.top_technologies,
                "trending_keywords": self.trending_keywords,
                "top_hiring_companies": self.top_hiring_companies,
                "top_locations": self.top_locations,
                "recent_count": self.recent_count,
                "total_analyzed": self.total_analyzed,
                "mean_score": self.mean_score,
            });
            signals.push(
                Signal::new(
                    SignalType::Trend,
                    "Job market trends",
                    description,
                    0,
                    source,
                    self.analyzed_at,
                )
                .with_data(data),
            );
        }

        for anomaly in &self.anomalies {
            let job = &anomaly.job.job;
            signals.push(
                Signal::new(
                    SignalType::Anomaly,
                    format!("High-value posting: {} at {}", job.title, job.company),
                    anomaly.reason.clone(),
                    anomaly.job.score,
                    source,
                    anomaly.detected_at,
                )
                .keyed_by(&job.id)
                .with_data(serde_json::json!({
                    "job_id": job.id,
                    "url": job.url,
                    "ratio_to_mean": anomaly.ratio_to_mean,
                })),
            );
        }

        signals
    }
}

fn join_values(entries: &[CountEntry], n: usize) -> String {
    if entries.is_empty() {
        return "none".to_string();
    }
    entries
        .iter()
        .take(n)
        .map(|e| e.value.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds [`TrendReport`]s. Pure; never fails.
#[derive(Debug, Clone)]
pub struct TrendEngine {
    vocabulary: Vec<String>,
}

impl Default for TrendEngine {
    fn default() -> Self {
        Self {
            vocabulary: TECH_VOCABULARY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TrendEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, jobs: &[ScoredJob]) -> TrendReport {
        self.analyze_at(jobs, Utc::now())
    }

    pub fn analyze_at(&self, jobs: &[ScoredJob], now: DateTime<Utc>) -> TrendReport {
        let mut technologies: IndexMap<String, i64> = IndexMap::new();
        let mut keywords: IndexMap<String, i64> = IndexMap::new();
        let mut companies: IndexMap<String, i64> = IndexMap::new();
        let mut locations: IndexMap<String, i64> = IndexMap::new();

        let recent_cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
        let mut recent_count = 0;

        for scored in jobs {
            let job = &scored.job;
            for token in &job.stack {
                let token = token.trim().to_lowercase();
                if !token.is_empty() {
                    *technologies.entry(token).or_default() += 1;
                }
            }

            let title = job.title.to_lowercase();
            for keyword in &self.vocabulary {
                if title.contains(keyword.as_str()) {
                    *keywords.entry(keyword.clone()).or_default() += 1;
                }
            }

            *companies.entry(job.company.clone()).or_default() += 1;
            *locations.entry(job.location.clone()).or_default() += 1;

            if job.posted_at >= recent_cutoff {
                recent_count += 1;
            }
        }

        let anomalies = detect_anomalies(jobs, now);
        let report = TrendReport {
            top_technologies: top_n(technologies),
            trending_keywords: top_n(keywords),
            top_hiring_companies: top_n(companies),
            top_locations: top_n(locations),
            recent_count,
            total_analyzed: jobs.len(),
            mean_score: mean_score(jobs),
            anomalies,
            analyzed_at: now,
        };

        info!(
            total = report.total_analyzed,
            recent = report.recent_count,
            anomalies = report.anomalies.len(),
            "Trend analysis complete"
        );
        report
    }
}

/// Highest counts first; equal counts keep first-seen order.
fn top_n(counts: IndexMap<String, i64>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(value, count)| CountEntry { value, count })
        .collect();
    // sort_by is stable
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(TOP_N);
    entries
}

fn mean_score(jobs: &[ScoredJob]) -> f64 {
    if jobs.is_empty() {
        return 0.0;
    }
    let sum: u64 = jobs.iter().map(|j| j.score as u64).sum();
    sum as f64 / jobs.len() as f64
}

/// Postings scoring at least twice the batch mean and above the floor.
pub fn detect_anomalies(jobs: &[ScoredJob], now: DateTime<Utc>) -> Vec<Anomaly> {
    let mean = mean_score(jobs);
    if jobs.is_empty() {
        return Vec::new();
    }

    jobs.iter()
        .filter(|j| j.score as f64 >= mean * ANOMALY_MEAN_MULTIPLIER && j.score > ANOMALY_SCORE_FLOOR)
        .map(|j| {
            let ratio = if mean > 0.0 { j.score as f64 / mean } else { 0.0 };
            Anomaly {
                kind: AnomalyKind::HighValue,
                job: j.clone(),
                ratio_to_mean: ratio,
                reason: format!("Score {} is {:.1}x average", j.score, ratio),
                detected_at: now,
            }
        })
        .collect()
}

/// Whether `current_count` is a spike against `historical_average`.
///
/// Never a spike when the average is zero (or not a usable number).
pub fn is_spike(current_count: usize, historical_average: f64, threshold: f64) -> bool {
    if !historical_average.is_finite() || historical_average <= 0.0 {
        return false;
    }
    let ratio = current_count as f64 / historical_average;
    let spike = ratio >= threshold;
    if spike {
        warn!(
            current = current_count,
            average = historical_average,
            ratio = %format!("{:.2}", ratio),
            "Posting spike detected"
        );
    }
    spike
}
