//! Weighted relevance scoring.
//!
//! Four integer sub-scores (freshness, keyword, stack, location) are summed
//! and capped at 100. Scoring is pure: the same job, rules and "now" always
//! give the same score, and a missing input scores 0 for its component.

pub mod rules;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use rules::{ScoringRules, Weights};

use crate::types::job::CanonicalJob;

/// Maximum score a job can reach.
pub const MAX_SCORE: u8 = 100;

/// The four sub-scores behind a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub freshness: u32,
    pub keyword: u32,
    pub stack: u32,
    pub location: u32,
}

impl ScoreBreakdown {
    /// Sum of the components, capped at [`MAX_SCORE`].
    pub fn total(&self) -> u8 {
        let sum = self.freshness + self.keyword + self.stack + self.location;
        sum.min(MAX_SCORE as u32) as u8
    }
}

/// Scores canonical jobs against a rule set.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    rules: ScoringRules,
}

impl Scorer {
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn score(&self, job: &CanonicalJob) -> u8 {
        self.score_at(job, Utc::now())
    }

    pub fn score_at(&self, job: &CanonicalJob, now: DateTime<Utc>) -> u8 {
        self.breakdown_at(job, now).total()
    }

    pub fn breakdown_at(&self, job: &CanonicalJob, now: DateTime<Utc>) -> ScoreBreakdown {
        let weights = &self.rules.weights;
        let breakdown = ScoreBreakdown {
            freshness: freshness_score(
                age_days(job.posted_at, now),
                self.rules.max_age_days,
                weights.freshness,
            ),
            keyword: keyword_score(&job.title, &self.rules.keywords, weights.keyword),
            stack: stack_score(&job.stack, &self.rules.keywords, weights.stack),
            location: location_score(&job.location, &self.rules.locations, weights.location),
        };
        tracing::trace!(job_id = %job.id, ?breakdown, "Scored job");
        breakdown
    }
}

/// Whole days between `posted_at` and `now`; future posts count as age 0.
pub fn age_days(posted_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - posted_at).num_days().max(0)
}

/// Linear decay from `weight` at age 0 to 0 at `max_age_days`.
pub fn freshness_score(age_days: i64, max_age_days: i64, weight: u32) -> u32 {
    if max_age_days <= 0 || age_days > max_age_days {
        return 0;
    }
    let age = age_days.max(0) as f64;
    let value = weight as f64 * (1.0 - age / max_age_days as f64);
    value.floor().max(0.0) as u32
}

/// Fraction of keywords found in the title, scaled to `weight`.
pub fn keyword_score(title: &str, keywords: &[String], weight: u32) -> u32 {
    if title.is_empty() || keywords.is_empty() {
        return 0;
    }
    let title = title.to_lowercase();
    let matches = keywords
        .iter()
        .filter(|kw| !kw.is_empty() && title.contains(&kw.to_lowercase()))
        .count();
    scaled(weight, matches, keywords.len())
}

/// Fraction of stack tokens containing any keyword, scaled to `weight`.
pub fn stack_score(stack: &[String], keywords: &[String], weight: u32) -> u32 {
    if stack.is_empty() || keywords.is_empty() {
        return 0;
    }
    let keywords: Vec<String> = keywords
        .iter()
        .filter(|kw| !kw.is_empty())
        .map(|kw| kw.to_lowercase())
        .collect();
    let matches = stack
        .iter()
        .map(|token| token.to_lowercase())
        .filter(|token| keywords.iter().any(|kw| token.contains(kw.as_str())))
        .count();
    scaled(weight, matches, stack.len())
}

/// Full weight if any preferred location occurs in `location`.
pub fn location_score(location: &str, preferred: &[String], weight: u32) -> u32 {
    if location.is_empty() {
        return 0;
    }
    let location = location.to_lowercase();
    let hit = preferred
        .iter()
        .any(|p| !p.is_empty() && location.contains(&p.to_lowercase()));
    if hit {
        weight
    } else {
        0
    }
}

fn scaled(weight: u32, matches: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (weight as u64 * matches as u64 / total as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap()
    }

    fn job(title: &str, location: &str, stack: &[&str], posted_at: DateTime<Utc>) -> CanonicalJob {
        CanonicalJob {
            id: "job-1".to_string(),
            title: title.to_string(),
            company: "Acme".to_string(),
            location: location.to_string(),
            stack: stack.iter().map(|s| s.to_string()).collect(),
            url: "https://acme.dev/1".to_string(),
            posted_at,
            source: "test".to_string(),
            raw_payload: String::new(),
        }
    }

    #[test]
    fn senior_python_engineer_breakdown() {
        let scorer = Scorer::default();
        let job = job("Senior Python Engineer", "Remote", &["python", "django"], now());

        let breakdown = scorer.breakdown_at(&job, now());
        // "python" and "engineer" out of six keywords; one of two stack tokens
        assert_eq!(
            breakdown,
            ScoreBreakdown {
                freshness: 30,
                keyword: 13,
                stack: 10,
                location: 10,
            }
        );
        assert_eq!(scorer.score_at(&job, now()), 63);
    }

    #[test]
    fn freshness_decays_and_reaches_zero() {
        let mut previous = u32::MAX;
        for age in 0..=10 {
            let value = freshness_score(age, 7, 30);
            assert!(value <= previous, "age {} increased freshness", age);
            previous = value;
            if age > 7 {
                assert_eq!(value, 0);
            }
        }
        assert_eq!(freshness_score(0, 7, 30), 30);
        assert_eq!(freshness_score(1, 7, 30), 25);
        assert_eq!(freshness_score(7, 7, 30), 0);
        assert_eq!(freshness_score(3, 0, 30), 0);
    }

    #[test]
    fn future_posts_count_as_fresh() {
        let future = now() + Duration::days(3);
        assert_eq!(age_days(future, now()), 0);

        let scorer = Scorer::default();
        let breakdown = scorer.breakdown_at(&job("x", "", &[], future), now());
        assert_eq!(breakdown.freshness, 30);
    }

    #[test]
    fn partial_days_are_floored() {
        let posted = now() - Duration::hours(47);
        assert_eq!(age_days(posted, now()), 1);
    }

    #[test]
    fn keyword_matching_is_case_insensitive_substring() {
        let keywords: Vec<String> = vec!["RUST".into(), "backend".into()];
        assert_eq!(keyword_score("Rustacean Backend Dev", &keywords, 40), 40);
        assert_eq!(keyword_score("Rust dev", &keywords, 40), 20);
        assert_eq!(keyword_score("", &keywords, 40), 0);
        assert_eq!(keyword_score("Rust", &[], 40), 0);
    }

    #[test]
    fn stack_counts_tokens_containing_a_keyword() {
        let keywords: Vec<String> = vec!["data".into(), "python".into()];
        let stack: Vec<String> = vec!["python3".into(), "bigdata".into(), "go".into()];
        // two of three tokens match
        assert_eq!(stack_score(&stack, &keywords, 20), 13);
        assert_eq!(stack_score(&[], &keywords, 20), 0);
    }

    #[test]
    fn location_is_binary() {
        let preferred: Vec<String> = vec!["kenya".into(), "remote".into()];
        assert_eq!(location_score("Nairobi, Kenya", &preferred, 10), 10);
        assert_eq!(location_score("Berlin", &preferred, 10), 0);
        assert_eq!(location_score("", &preferred, 10), 0);
    }

    #[test]
    fn total_is_capped_at_100() {
        let rules = ScoringRules {
            keywords: vec!["rust".into()],
            locations: vec!["remote".into()],
            max_age_days: 7,
            weights: Weights {
                freshness: 90,
                keyword: 90,
                stack: 90,
                location: 90,
            },
        };
        let scorer = Scorer::new(rules);
        let score = scorer.score_at(&job("Rust", "Remote", &["rust"], now()), now());
        assert_eq!(score, MAX_SCORE);
    }

    #[test]
    fn scores_stay_in_bounds_across_inputs() {
        let scorer = Scorer::default();
        let titles = ["", "AI", "Python Backend ML Data Engineer AI", "Chef"];
        let locations = ["", "Remote", "Kenya, Africa", "Paris"];
        for title in titles {
            for location in locations {
                for age in [-5, 0, 3, 7, 30] {
                    let posted = now() - Duration::days(age);
                    let score = scorer.score_at(&job(title, location, &["python", "x"], posted), now());
                    assert!(score <= MAX_SCORE);
                }
            }
        }
    }
}
