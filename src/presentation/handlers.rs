// HTTP request handlers
use crate::application::chart_service::ChartQuery;
use crate::application::progress::{ProgressEntry, ProgressLog};
use crate::domain::dashboard::Dashboard;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ChartParams {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub daily: bool,
}

impl From<ChartParams> for ChartQuery {
    fn from(params: ChartParams) -> Self {
        Self {
            start: params.start,
            end: params.end,
            daily: params.daily,
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Classified batch of every stored row
pub async fn get_batch(State(state): State<Arc<AppState>>) -> Response {
    let Some(service) = &state.batch_service else {
        return (StatusCode::NOT_FOUND, Json(json!({ "status": "no row feed configured" }))).into_response();
    };

    let log = ProgressLog::new();
    match service.build_batch(&log).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => {
            tracing::error!("Error building batch: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "status": e.to_string() }))).into_response()
        }
    }
}

/// Charts for every configured source, optionally filtered and averaged
pub async fn get_charts(Query(params): Query<ChartParams>, State(state): State<Arc<AppState>>) -> Json<Dashboard> {
    let query = ChartQuery::from(params);
    Json(state.chart_service.build_dashboard(&query).await)
}

/// Progress log of the most recent chart build
pub async fn get_progress(State(state): State<Arc<AppState>>) -> Json<Vec<ProgressEntry>> {
    Json(state.chart_service.last_progress())
}
