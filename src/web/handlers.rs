use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::scheduler::SchedulerStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub active_jobs: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        active_jobs: state.scheduler.active_job_count().await,
    })
}

pub async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}
