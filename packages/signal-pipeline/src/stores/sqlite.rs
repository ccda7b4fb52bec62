//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - Local development
//! - Single-server deployments
//! - Testing (`sqlite::memory:`)
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`)
//! so string comparison orders them correctly.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{Acquire, FromRow, QueryBuilder, Sqlite};
use tracing::warn;

use crate::error::{PersistenceError, StoreResult};
use crate::stores::{like_pattern, to_entries};
use crate::traits::store::{JobStore, SignalStore};
use crate::types::job::{JobFilter, JobStats, PersistedJob, ScoredJob, UpsertOutcome};
use crate::types::signal::{Signal, SignalFilter};

const JOB_COLUMNS: &str = "id, title, company, location, stack, url, posted_at, source, score, \
                           created_at, updated_at, alerted, raw_payload";
const SIGNAL_COLUMNS: &str = "id, signal_type, title, description, data, score, detected_at, source";

/// SQLite-based job and signal store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite://signalforge.db?mode=rwc` - File-based, create if missing
    /// - `sqlite::memory:` - Use [`SqliteStore::in_memory`] instead
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Pinned to one connection that never expires: every `:memory:`
    /// connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                stack TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL,
                posted_at TEXT NOT NULL,
                source TEXT NOT NULL,
                score INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                alerted INTEGER NOT NULL DEFAULT 0,
                raw_payload TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_score ON jobs(score);
            CREATE INDEX IF NOT EXISTS idx_jobs_posted_at ON jobs(posted_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_alerted ON jobs(alerted);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id TEXT PRIMARY KEY,
                signal_type TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                data TEXT NOT NULL DEFAULT 'null',
                score INTEGER NOT NULL,
                detected_at TEXT NOT NULL,
                source TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_signals_detected_at ON signals(detected_at);
            CREATE INDEX IF NOT EXISTS idx_signals_type ON signals(signal_type);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_text(id: &str, field: &str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PersistenceError::CorruptRow {
            id: id.to_string(),
            reason: format!("{}: {}", field, e),
        })
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    title: String,
    company: String,
    location: String,
    stack: String,
    url: String,
    posted_at: String,
    source: String,
    score: i64,
    created_at: String,
    updated_at: String,
    alerted: bool,
    raw_payload: String,
}

impl JobRow {
    fn into_job(self) -> StoreResult<PersistedJob> {
        let score = u8::try_from(self.score).map_err(|_| PersistenceError::CorruptRow {
            id: self.id.clone(),
            reason: format!("score out of range: {}", self.score),
        })?;
        Ok(PersistedJob {
            posted_at: from_text(&self.id, "posted_at", &self.posted_at)?,
            created_at: from_text(&self.id, "created_at", &self.created_at)?,
            updated_at: from_text(&self.id, "updated_at", &self.updated_at)?,
            id: self.id,
            title: self.title,
            company: self.company,
            location: self.location,
            stack: self.stack,
            url: self.url,
            source: self.source,
            score,
            alerted: self.alerted,
            raw_payload: self.raw_payload,
        })
    }
}

#[derive(Debug, FromRow)]
struct SignalRow {
    id: String,
    signal_type: String,
    title: String,
    description: String,
    data: String,
    score: i64,
    detected_at: String,
    source: String,
}

impl SignalRow {
    fn into_signal(self) -> StoreResult<Signal> {
        let corrupt = |id: &str, reason: String| PersistenceError::CorruptRow {
            id: id.to_string(),
            reason,
        };
        let signal_type = self
            .signal_type
            .parse()
            .map_err(|e: String| corrupt(&self.id, e))?;
        let data = serde_json::from_str(&self.data)
            .map_err(|e| corrupt(&self.id, format!("data: {}", e)))?;
        let score = u8::try_from(self.score)
            .map_err(|_| corrupt(&self.id, format!("score out of range: {}", self.score)))?;
        Ok(Signal {
            detected_at: from_text(&self.id, "detected_at", &self.detected_at)?,
            id: self.id,
            signal_type,
            title: self.title,
            description: self.description,
            data,
            score,
            source: self.source,
        })
    }
}

/// Insert-or-rescore one job on an open transaction.
async fn upsert_one(
    conn: &mut SqliteConnection,
    job: &ScoredJob,
    now: &str,
) -> StoreResult<UpsertOutcome> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO jobs (id, title, company, location, stack, url, posted_at, source, score,
                          created_at, updated_at, alerted, raw_payload)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&job.job.id)
    .bind(&job.job.title)
    .bind(&job.job.company)
    .bind(&job.job.location)
    .bind(job.job.stack_string())
    .bind(&job.job.url)
    .bind(to_text(job.job.posted_at))
    .bind(&job.job.source)
    .bind(job.score as i64)
    .bind(now)
    .bind(now)
    .bind(&job.job.raw_payload)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() > 0 {
        return Ok(UpsertOutcome::CREATED);
    }

    let stored: Option<i64> = sqlx::query_scalar("SELECT score FROM jobs WHERE id = ?")
        .bind(&job.job.id)
        .fetch_optional(&mut *conn)
        .await?;

    match stored {
        None => Err(PersistenceError::Backend(format!(
            "insert of {} conflicted but no row exists",
            job.job.id
        ))),
        Some(score) if score == job.score as i64 => Ok(UpsertOutcome::UNCHANGED),
        Some(_) => {
            sqlx::query("UPDATE jobs SET score = ?, updated_at = ? WHERE id = ?")
                .bind(job.score as i64)
                .bind(now)
                .bind(&job.job.id)
                .execute(&mut *conn)
                .await?;
            Ok(UpsertOutcome::RESCORED)
        }
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn upsert_batch(
        &self,
        jobs: &[ScoredJob],
    ) -> StoreResult<Vec<StoreResult<UpsertOutcome>>> {
        let now = to_text(Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::Transaction(e.to_string()))?;

        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            // SAVEPOINT per item: a failing item rolls back alone
            let mut savepoint = match Acquire::begin(&mut tx).await {
                Ok(sp) => sp,
                Err(e) => {
                    results.push(Err(PersistenceError::from(e)));
                    continue;
                }
            };

            match upsert_one(&mut savepoint, job, &now).await {
                Ok(outcome) => {
                    savepoint
                        .commit()
                        .await
                        .map_err(|e| PersistenceError::Transaction(e.to_string()))?;
                    results.push(Ok(outcome));
                }
                Err(e) => {
                    warn!(job_id = %job.id(), error = %e, "Rolling back failed job upsert");
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| PersistenceError::Transaction(e.to_string()))?;
                    results.push(Err(e));
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| PersistenceError::Transaction(e.to_string()))?;
        Ok(results)
    }

    async fn mark_alerted(&self, id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET alerted = 1 WHERE id = ? AND alerted = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_job(&self, id: &str) -> StoreResult<Option<PersistedJob>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(JobRow::into_job).transpose()
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<PersistedJob>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM jobs WHERE 1 = 1", JOB_COLUMNS));
        if let Some(min) = filter.min_score {
            qb.push(" AND score >= ").push_bind(min as i64);
        }
        if let Some(location) = &filter.location {
            qb.push(" AND LOWER(location) LIKE ")
                .push_bind(like_pattern(location))
                .push(" ESCAPE '\\'");
        }
        if let Some(company) = &filter.company {
            qb.push(" AND LOWER(company) LIKE ")
                .push_bind(like_pattern(company))
                .push(" ESCAPE '\\'");
        }
        if let Some(after) = filter.posted_after {
            qb.push(" AND posted_at >= ").push_bind(to_text(after));
        }
        qb.push(" ORDER BY score DESC, posted_at DESC, id ASC LIMIT ")
            .push_bind(filter.limit as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);

        let rows: Vec<JobRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn delete_job(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn job_stats(&self, threshold: u8, since: DateTime<Utc>) -> StoreResult<JobStats> {
        let (total_jobs, high_score_jobs, alerted_jobs, recent_jobs): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(CASE WHEN score >= ? THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(CASE WHEN alerted THEN 1 ELSE 0 END), 0),
                       COALESCE(SUM(CASE WHEN posted_at >= ? THEN 1 ELSE 0 END), 0)
                FROM jobs
                "#,
            )
            .bind(threshold as i64)
            .bind(to_text(since))
            .fetch_one(&self.pool)
            .await?;

        let top_companies: Vec<(String, i64)> = sqlx::query_as(
            "SELECT company, COUNT(*) AS n FROM jobs GROUP BY company ORDER BY n DESC, company ASC LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;

        let top_locations: Vec<(String, i64)> = sqlx::query_as(
            "SELECT location, COUNT(*) AS n FROM jobs GROUP BY location ORDER BY n DESC, location ASC LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(JobStats {
            total_jobs,
            high_score_jobs,
            alerted_jobs,
            recent_jobs,
            top_companies: to_entries(top_companies),
            top_locations: to_entries(top_locations),
        })
    }
}

#[async_trait]
impl SignalStore for SqliteStore {
    async fn record_signals(&self, signals: &[Signal]) -> StoreResult<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::Transaction(e.to_string()))?;

        let mut written = 0;
        for signal in signals {
            let data = serde_json::to_string(&signal.data).map_err(|e| {
                PersistenceError::CorruptRow {
                    id: signal.id.clone(),
                    reason: e.to_string(),
                }
            })?;
            let result = sqlx::query(
                r#"
                INSERT INTO signals (id, signal_type, title, description, data, score, detected_at, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&signal.id)
            .bind(signal.signal_type.as_str())
            .bind(&signal.title)
            .bind(&signal.description)
            .bind(data)
            .bind(signal.score as i64)
            .bind(to_text(signal.detected_at))
            .bind(&signal.source)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                warn!(signal_id = %signal.id, title = %signal.title, "Signal id already recorded, skipping");
            }
            written += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| PersistenceError::Transaction(e.to_string()))?;
        Ok(written)
    }

    async fn list_signals(&self, filter: &SignalFilter) -> StoreResult<Vec<Signal>> {
        let mut qb =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM signals WHERE 1 = 1", SIGNAL_COLUMNS));
        if let Some(kind) = filter.signal_type {
            qb.push(" AND signal_type = ").push_bind(kind.as_str());
        }
        if let Some(min) = filter.min_score {
            qb.push(" AND score >= ").push_bind(min as i64);
        }
        qb.push(" ORDER BY detected_at DESC, id ASC LIMIT ")
            .push_bind(filter.limit as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);

        let rows: Vec<SignalRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(SignalRow::into_signal).collect()
    }

    async fn find_signal(&self, id: &str) -> StoreResult<Option<Signal>> {
        let row: Option<SignalRow> =
            sqlx::query_as(&format!("SELECT {} FROM signals WHERE id = ?", SIGNAL_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(SignalRow::into_signal).transpose()
    }

    async fn count_signals(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signals")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
