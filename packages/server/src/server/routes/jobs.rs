use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use signal_pipeline::normalize::parse_datetime;
use signal_pipeline::{CountEntry, JobFilter, JobStore, PersistedJob, RawValue};

use crate::kernel::trigger_background_run;
use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};

/// Window for `recent_jobs` in the stats summary.
const STATS_RECENT_DAYS: i64 = 7;

pub(crate) const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub min_score: Option<i64>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub posted_after: Option<String>,
}

impl ListJobsQuery {
    fn into_filter(self) -> ApiResult<JobFilter> {
        let (limit, offset) = page(self.limit, self.offset)?;
        let posted_after = match non_empty(self.posted_after) {
            Some(text) => Some(parse_posted_after(&text)?),
            None => None,
        };

        Ok(JobFilter {
            limit,
            offset,
            min_score: score_floor(self.min_score)?,
            location: non_empty(self.location),
            company: non_empty(self.company),
            posted_after,
        })
    }
}

/// Validate `limit` (1..=200, default 50) and `offset` (>= 0).
pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> ApiResult<(u32, u32)> {
    let limit = limit.unwrap_or(50);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    let offset = offset.unwrap_or(0);
    let offset = u32::try_from(offset)
        .map_err(|_| ApiError::BadRequest("offset must be a non-negative integer".to_string()))?;
    Ok((limit as u32, offset))
}

pub(crate) fn score_floor(min_score: Option<i64>) -> ApiResult<Option<u8>> {
    match min_score {
        None => Ok(None),
        Some(score @ 0..=100) => Ok(Some(score as u8)),
        Some(_) => Err(ApiError::BadRequest(
            "min_score must be between 0 and 100".to_string(),
        )),
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_posted_after(text: &str) -> ApiResult<DateTime<Utc>> {
    parse_datetime(&RawValue::Text(text.to_string()))
        .ok_or_else(|| ApiError::BadRequest("Invalid date format".to_string()))
}

/// A job as the API presents it.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub stack: Vec<String>,
    pub url: String,
    pub posted_at: DateTime<Utc>,
    pub score: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: String,
    pub alerted: bool,
}

impl From<PersistedJob> for JobResponse {
    fn from(job: PersistedJob) -> Self {
        Self {
            stack: job.stack_tokens(),
            id: job.id,
            title: job.title,
            company: job.company,
            location: job.location,
            url: job.url,
            posted_at: job.posted_at,
            score: job.score,
            created_at: job.created_at,
            updated_at: job.updated_at,
            source: job.source,
            alerted: job.alerted,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub high_score_jobs: i64,
    pub alerted_jobs: i64,
    pub recent_jobs: i64,
    pub top_companies: Vec<CompanyCount>,
    pub top_locations: Vec<LocationCount>,
}

/// List jobs, best score first
pub async fn list_jobs_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<JobResponse>>> {
    let filter = query.into_filter()?;
    let jobs = state.repository.list_jobs(&filter).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

pub async fn get_job_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let job = state
        .repository
        .find_job(&id)
        .await?
        .ok_or(ApiError::NotFound("Job"))?;
    Ok(Json(job.into()))
}

pub async fn delete_job_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.repository.delete_job(&id).await? {
        return Err(ApiError::NotFound("Job"));
    }
    tracing::info!(job_id = %id, "Job deleted");
    Ok(Json(json!({ "message": "Job deleted successfully", "id": id })))
}

pub async fn job_stats_handler(
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<StatsResponse>> {
    let since = Utc::now() - Duration::days(STATS_RECENT_DAYS);
    let stats = state.repository.job_stats(state.alert_threshold, since).await?;

    let companies = |entries: Vec<CountEntry>| -> Vec<CompanyCount> {
        entries
            .into_iter()
            .map(|e| CompanyCount {
                company: e.value,
                count: e.count,
            })
            .collect()
    };
    let locations = |entries: Vec<CountEntry>| -> Vec<LocationCount> {
        entries
            .into_iter()
            .map(|e| LocationCount {
                location: e.value,
                count: e.count,
            })
            .collect()
    };

    Ok(Json(StatsResponse {
        total_jobs: stats.total_jobs,
        high_score_jobs: stats.high_score_jobs,
        alerted_jobs: stats.alerted_jobs,
        recent_jobs: stats.recent_jobs,
        top_companies: companies(stats.top_companies),
        top_locations: locations(stats.top_locations),
    }))
}

/// Start a pipeline run in the background
pub async fn collect_handler(Extension(state): Extension<AppState>) -> Json<Value> {
    let started = trigger_background_run(&state.orchestrator, state.shutdown.child_token());
    if !started {
        tracing::info!("Collect requested while a run is in progress");
    }
    Json(json!({ "started": started }))
}
