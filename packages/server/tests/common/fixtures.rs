//! Stored rows for API and store tests.

use chrono::{DateTime, Duration, Utc};
use signal_pipeline::{CanonicalJob, ScoredJob, Signal, SignalType};

/// A scored posting with a fixed id.
pub fn scored_job(
    id: &str,
    title: &str,
    company: &str,
    location: &str,
    score: u8,
    posted_at: DateTime<Utc>,
) -> ScoredJob {
    CanonicalJob {
        id: id.to_string(),
        title: title.to_string(),
        company: company.to_string(),
        location: location.to_string(),
        stack: vec!["python".to_string(), "django".to_string()],
        url: format!("https://jobs.example/{}", id),
        posted_at,
        source: "fixture".to_string(),
        raw_payload: String::new(),
    }
    .scored(score)
}

/// Three postings spread across score, location and age.
pub fn job_board() -> Vec<ScoredJob> {
    let now = Utc::now();
    vec![
        scored_job("job-a", "Senior Python Engineer", "Acme", "Remote", 63, now - Duration::days(1)),
        scored_job("job-b", "Backend Data Engineer", "Globex", "Remote", 93, now - Duration::days(2)),
        scored_job("job-c", "Chef", "Bistro", "Paris", 30, now - Duration::days(20)),
    ]
}

pub fn anomaly_signal(title: &str, score: u8, detected_at: DateTime<Utc>) -> Signal {
    Signal::new(
        SignalType::Anomaly,
        title,
        "Score well above the run mean",
        score,
        "pipeline",
        detected_at,
    )
}

pub fn trend_signal(title: &str, score: u8, detected_at: DateTime<Utc>) -> Signal {
    Signal::new(SignalType::Trend, title, "Rising keyword", score, "pipeline", detected_at)
        .with_data(serde_json::json!({ "keyword": "python", "count": 4 }))
}
