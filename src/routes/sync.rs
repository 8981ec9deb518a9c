use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::models::{SyncPayload, SyncResponse};
use crate::routes::{blocking, ApiError};
use crate::AppState;

pub async fn sync_cron_jobs(
    State(state): State<AppState>,
    payload: Result<Json<SyncPayload>, JsonRejection>,
) -> Result<Json<SyncResponse>, ApiError> {
    let Json(payload) = payload?;
    let Value::Array(jobs) = payload.cron_jobs else {
        return Err(ApiError::BadRequest("cron_jobs must be an array".to_string()));
    };

    let synced = blocking(&state.core, move |core| Ok(core.sync_cron_jobs(jobs))).await?;
    tracing::info!(synced, "cron jobs synced");
    Ok(Json(SyncResponse { success: true, synced }))
}
