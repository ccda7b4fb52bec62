//! Test harnesses.
//!
//! `ApiHarness` drives the router in-process over a `MemoryStore`.
//! `PostgresHarness` shares one testcontainers Postgres across all tests in
//! a binary; the container starts on first use.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use server_core::server::{build_app, AppState};
use signal_pipeline::testing::{MockNotifier, MockProducer};
use sqlx::PgPool;
use signal_pipeline::{
    CancellationToken, JobStore, MemoryStore, Orchestrator, PipelineConfig, PostgresStore,
    ScoredJob, Scorer, ScoringRules, Signal, SignalStore,
};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_THRESHOLD: u8 = 60;

pub fn init_tracing() {
    // Run tests with: RUST_LOG=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Router plus handles on everything behind it.
pub struct ApiHarness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MockNotifier>,
    pub orchestrator: Arc<Orchestrator>,
    pub shutdown: CancellationToken,
    app: Router,
}

impl ApiHarness {
    pub fn new() -> Self {
        Self::with_producer(MockProducer::new("board", Vec::new()))
    }

    pub fn with_producer(producer: MockProducer) -> Self {
        init_tracing();

        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::new());
        let orchestrator = Arc::new(
            Orchestrator::new(
                store.clone(),
                notifier.clone(),
                Scorer::new(ScoringRules::default()),
            )
            .with_config(PipelineConfig {
                alert_threshold: TEST_THRESHOLD,
                alert_pacing: std::time::Duration::ZERO,
                ..Default::default()
            })
            .with_producer(producer),
        );
        let shutdown = CancellationToken::new();

        let app = build_app(AppState {
            repository: store.clone(),
            orchestrator: orchestrator.clone(),
            alert_threshold: TEST_THRESHOLD,
            shutdown: shutdown.clone(),
        });

        Self {
            store,
            notifier,
            orchestrator,
            shutdown,
            app,
        }
    }

    pub async fn seed_jobs(&self, jobs: &[ScoredJob]) {
        self.store
            .upsert_batch(jobs)
            .await
            .expect("Failed to seed jobs");
    }

    pub async fn seed_signals(&self, signals: &[Signal]) {
        self.store
            .record_signals(signals)
            .await
            .expect("Failed to seed signals");
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri).await
    }

    /// Send a bodyless request and decode the JSON reply.
    pub async fn request(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };
        (status, body)
    }
}

impl Drop for ApiHarness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct SharedPostgres {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_POSTGRES: OnceCell<SharedPostgres> = OnceCell::const_new();

impl SharedPostgres {
    async fn init() -> Result<Self> {
        init_tracing();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_POSTGRES
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared Postgres container")
            })
            .await
    }
}

/// A `PostgresStore` on a fresh database inside the shared container.
///
/// Every harness gets its own database so tests can run in parallel.
pub struct PostgresHarness {
    pub store: PostgresStore,
}

impl PostgresHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedPostgres::get().await;

        let database = format!("signalforge_{}", Uuid::new_v4().simple());
        let admin = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to Postgres")?;
        sqlx::query(&format!("CREATE DATABASE {}", database))
            .execute(&admin)
            .await
            .context("Failed to create test database")?;
        admin.close().await;

        let base = infra
            .db_url
            .rsplit_once('/')
            .map(|(base, _)| base)
            .context("Database URL has no path")?;
        let store = PostgresStore::new(&format!("{}/{}", base, database))
            .await
            .context("Failed to connect PostgresStore")?;

        Ok(Self { store })
    }
}
