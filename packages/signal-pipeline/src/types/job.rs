//! Job types - canonical, scored and persisted postings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cleaned posting with a stable identity.
///
/// Lives only for the duration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalJob {
    /// Source id or content fingerprint; the deduplication key
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Lower-cased technology tokens, first-seen order, no duplicates
    pub stack: Vec<String>,
    pub url: String,
    pub posted_at: DateTime<Utc>,
    pub source: String,
    /// Original record as JSON, kept for audit
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub raw_payload: String,
}

impl CanonicalJob {
    /// Stack as stored: comma-joined tokens.
    pub fn stack_string(&self) -> String {
        self.stack.join(",")
    }

    /// Attach a score, producing the form the repository accepts.
    pub fn scored(self, score: u8) -> ScoredJob {
        ScoredJob { job: self, score }
    }
}

/// A canonical job after the scorer ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredJob {
    #[serde(flatten)]
    pub job: CanonicalJob,
    /// 0..=100
    pub score: u8,
}

impl ScoredJob {
    pub fn id(&self) -> &str {
        &self.job.id
    }
}

/// A job row as owned by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedJob {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Comma-joined stack tokens
    pub stack: String,
    pub url: String,
    pub posted_at: DateTime<Utc>,
    pub source: String,
    pub score: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub alerted: bool,
    #[serde(skip_serializing, default)]
    pub raw_payload: String,
}

impl PersistedJob {
    /// New row for a first sighting; `alerted` always starts false.
    pub fn from_scored(scored: &ScoredJob, now: DateTime<Utc>) -> Self {
        let job = &scored.job;
        Self {
            id: job.id.clone(),
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            stack: job.stack_string(),
            url: job.url.clone(),
            posted_at: job.posted_at,
            source: job.source.clone(),
            score: scored.score,
            created_at: now,
            updated_at: now,
            alerted: false,
            raw_payload: job.raw_payload.clone(),
        }
    }

    pub fn stack_tokens(&self) -> Vec<String> {
        split_stack(&self.stack)
    }

    /// Back to the scored form, e.g. to run trend analysis over stored rows.
    pub fn to_scored(&self) -> ScoredJob {
        ScoredJob {
            job: CanonicalJob {
                id: self.id.clone(),
                title: self.title.clone(),
                company: self.company.clone(),
                location: self.location.clone(),
                stack: self.stack_tokens(),
                url: self.url.clone(),
                posted_at: self.posted_at,
                source: self.source.clone(),
                raw_payload: String::new(),
            },
            score: self.score,
        }
    }
}

/// Split a stored comma-joined stack back into tokens.
pub fn split_stack(stack: &str) -> Vec<String> {
    stack
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// What an upsert did.
///
/// `changed` only describes a rescoring of an existing row; a fresh insert
/// reports `created = true, changed = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub created: bool,
    pub changed: bool,
}

impl UpsertOutcome {
    pub const CREATED: Self = Self {
        created: true,
        changed: false,
    };
    pub const RESCORED: Self = Self {
        created: false,
        changed: true,
    };
    pub const UNCHANGED: Self = Self {
        created: false,
        changed: false,
    };
}

/// Filters for listing stored jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFilter {
    pub limit: u32,
    pub offset: u32,
    pub min_score: Option<u8>,
    /// Case-insensitive substring match
    pub location: Option<String>,
    /// Case-insensitive substring match
    pub company: Option<String>,
    pub posted_after: Option<DateTime<Utc>>,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            min_score: None,
            location: None,
            company: None,
            posted_after: None,
        }
    }
}

impl JobFilter {
    /// Whether a row passes the non-paging filters.
    pub fn matches(&self, job: &PersistedJob) -> bool {
        if let Some(min) = self.min_score {
            if job.score < min {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !contains_ignore_case(&job.location, location) {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if !contains_ignore_case(&job.company, company) {
                return false;
            }
        }
        if let Some(after) = self.posted_after {
            if job.posted_at < after {
                return false;
            }
        }
        true
    }
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Aggregate counts over stored jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub total_jobs: i64,
    pub high_score_jobs: i64,
    pub alerted_jobs: i64,
    pub recent_jobs: i64,
    pub top_companies: Vec<CountEntry>,
    pub top_locations: Vec<CountEntry>,
}

/// A value and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub value: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: u8) -> ScoredJob {
        CanonicalJob {
            id: id.to_string(),
            title: "Rust Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            stack: vec!["rust".to_string(), "postgres".to_string()],
            url: "https://example.com/1".to_string(),
            posted_at: Utc::now(),
            source: "test".to_string(),
            raw_payload: "{}".to_string(),
        }
        .scored(score)
    }

    #[test]
    fn new_rows_start_unalerted() {
        let row = PersistedJob::from_scored(&scored("a", 80), Utc::now());
        assert!(!row.alerted);
        assert_eq!(row.stack, "rust,postgres");
        assert_eq!(row.created_at, row.updated_at);
    }

    #[test]
    fn persisted_round_trips_to_scored() {
        let original = scored("a", 42);
        let row = PersistedJob::from_scored(&original, Utc::now());
        let back = row.to_scored();
        assert_eq!(back.job.stack, original.job.stack);
        assert_eq!(back.score, 42);
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let row = PersistedJob::from_scored(&scored("a", 75), Utc::now());
        let filter = JobFilter {
            location: Some("REMOTE".to_string()),
            company: Some("acm".to_string()),
            min_score: Some(70),
            ..Default::default()
        };
        assert!(filter.matches(&row));

        let too_high = JobFilter {
            min_score: Some(76),
            ..Default::default()
        };
        assert!(!too_high.matches(&row));
    }

    #[test]
    fn split_stack_drops_blanks() {
        assert_eq!(split_stack("rust, ,sql,"), vec!["rust", "sql"]);
        assert!(split_stack("").is_empty());
    }
}
