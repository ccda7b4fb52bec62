use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use signal_pipeline::{Signal, SignalFilter, SignalStore, SignalType};

use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};
use crate::server::routes::jobs::{non_empty, page, score_floor};

#[derive(Debug, Default, Deserialize)]
pub struct ListSignalsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub signal_type: Option<String>,
    pub min_score: Option<i64>,
}

impl ListSignalsQuery {
    fn into_filter(self) -> ApiResult<SignalFilter> {
        let (limit, offset) = page(self.limit, self.offset)?;
        let signal_type = non_empty(self.signal_type)
            .map(|t| t.parse::<SignalType>().map_err(ApiError::BadRequest))
            .transpose()?;

        Ok(SignalFilter {
            limit,
            offset,
            signal_type,
            min_score: score_floor(self.min_score)?,
        })
    }
}

/// List signals, newest first
pub async fn list_signals_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListSignalsQuery>,
) -> ApiResult<Json<Vec<Signal>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.repository.list_signals(&filter).await?))
}

pub async fn get_signal_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Signal>> {
    let signal = state
        .repository
        .find_signal(&id)
        .await?
        .ok_or(ApiError::NotFound("Signal"))?;
    Ok(Json(signal))
}
