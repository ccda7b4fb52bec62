//! REST API tests
//!
//! The router runs in-process over a `MemoryStore`; nothing listens on a socket.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;
use signal_pipeline::testing::{raw_job, MockProducer};
use signal_pipeline::JobStore;

use crate::common::{anomaly_signal, job_board, trend_signal, ApiHarness, TEST_THRESHOLD};

// ============================================================================
// Health & metadata
// ============================================================================

#[tokio::test]
async fn health_reports_store_and_pipeline() {
    let api = ApiHarness::new();

    let (status, body) = api.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "ok");
    assert_eq!(body["pipeline"]["state"], "idle");
    assert_eq!(body["pipeline"]["running"], false);
    assert_eq!(body["pipeline"]["producers"], json!(["board"]));
}

#[tokio::test]
async fn api_root_describes_service() {
    let api = ApiHarness::new();

    let (status, body) = api.get("/api").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "SignalForge API");
    assert_eq!(body["status"], "running");
    assert!(body["version"].is_string());
}

// ============================================================================
// Jobs
// ============================================================================

#[tokio::test]
async fn jobs_are_listed_best_score_first() {
    let api = ApiHarness::new();
    api.seed_jobs(&job_board()).await;

    let (status, body) = api.get("/api/jobs").await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["job-b", "job-a", "job-c"]);

    let top = &body[0];
    assert_eq!(top["company"], "Globex");
    assert_eq!(top["stack"], json!(["python", "django"]));
    assert_eq!(top["alerted"], false);
    assert!(top.get("raw_payload").is_none());
}

#[tokio::test]
async fn job_filters_combine() {
    let api = ApiHarness::new();
    api.seed_jobs(&job_board()).await;

    let (_, body) = api.get("/api/jobs?min_score=60&location=remote").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = api.get("/api/jobs?company=GLOBEX").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "job-b");

    let since = (Utc::now() - chrono::Duration::days(5)).format("%Y-%m-%d");
    let (_, body) = api.get(&format!("/api/jobs?posted_after={}", since)).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = api.get("/api/jobs?limit=1&offset=1").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "job-a");
}

#[tokio::test]
async fn invalid_query_parameters_are_rejected() {
    let api = ApiHarness::new();

    for uri in [
        "/api/jobs?limit=0",
        "/api/jobs?limit=500",
        "/api/jobs?min_score=101",
        "/api/jobs?posted_after=next-tuesday",
    ] {
        let (status, body) = api.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }

    let (_, body) = api.get("/api/jobs?posted_after=next-tuesday").await;
    assert_eq!(body["error"], "Invalid date format");
}

#[tokio::test]
async fn single_job_lookup() {
    let api = ApiHarness::new();
    api.seed_jobs(&job_board()).await;

    let (status, body) = api.get("/api/jobs/job-a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Senior Python Engineer");
    assert_eq!(body["score"], 63);

    let (status, body) = api.get("/api/jobs/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");
}

#[tokio::test]
async fn delete_removes_job_once() {
    let api = ApiHarness::new();
    api.seed_jobs(&job_board()).await;

    let (status, body) = api.request(Method::DELETE, "/api/jobs/job-c").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Job deleted successfully");
    assert_eq!(body["id"], "job-c");
    assert_eq!(api.store.job_count(), 2);

    let (status, _) = api.request(Method::DELETE, "/api/jobs/job-c").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_summary_counts_jobs() {
    let api = ApiHarness::new();
    api.seed_jobs(&job_board()).await;
    api.store.mark_alerted("job-b").await.unwrap();

    let (status, body) = api.get("/api/jobs/stats/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_jobs"], 3);
    // 63 and 93 clear the threshold
    assert!(TEST_THRESHOLD <= 63);
    assert_eq!(body["high_score_jobs"], 2);
    assert_eq!(body["alerted_jobs"], 1);
    assert_eq!(body["recent_jobs"], 2);
    assert_eq!(body["top_locations"][0], json!({ "location": "Remote", "count": 2 }));
    assert_eq!(body["top_companies"].as_array().unwrap().len(), 3);
    assert!(body["top_companies"][0]["company"].is_string());
}

#[tokio::test]
async fn collect_starts_one_run_at_a_time() {
    let api = ApiHarness::with_producer(
        MockProducer::new(
            "board",
            vec![raw_job("Senior Python Engineer", "Acme", "Remote", &["python", "django"])],
        )
        .with_delay(Duration::from_millis(300)),
    );

    let (status, body) = api.request(Method::POST, "/api/jobs/collect").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["started"], true);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (_, body) = api.request(Method::POST, "/api/jobs/collect").await;
    assert_eq!(body["started"], false);

    for _ in 0..100 {
        if !api.orchestrator.is_running() && api.store.job_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(api.store.job_count(), 1);
    // 63 at a threshold of 60
    assert_eq!(api.notifier.call_count(), 1);
}

// ============================================================================
// Signals
// ============================================================================

#[tokio::test]
async fn signals_are_listed_newest_first() {
    let api = ApiHarness::new();
    let now = Utc::now();
    api.seed_signals(&[
        anomaly_signal("High-value opportunity: Backend Data Engineer", 93, now - chrono::Duration::hours(2)),
        trend_signal("Trending: python", 40, now),
    ])
    .await;

    let (status, body) = api.get("/api/signals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["signal_type"], "trend");
    assert_eq!(body[0]["data"]["keyword"], "python");
    assert_eq!(body[1]["signal_type"], "anomaly");

    let (_, body) = api.get("/api/signals?signal_type=anomaly").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = api.get("/api/signals?min_score=50").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["score"], 93);
}

#[tokio::test]
async fn unknown_signal_type_is_bad_request() {
    let api = ApiHarness::new();

    let (status, body) = api.get("/api/signals?signal_type=rumour").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("rumour"));
}

#[tokio::test]
async fn single_signal_lookup() {
    let api = ApiHarness::new();
    let signal = anomaly_signal("High-value opportunity: Chef", 90, Utc::now());
    api.seed_signals(std::slice::from_ref(&signal)).await;

    let (status, body) = api.get(&format!("/api/signals/{}", signal.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "High-value opportunity: Chef");

    let (status, body) = api.get("/api/signals/0000000000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Signal not found");
}
