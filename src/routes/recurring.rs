use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;

use crate::dashboard::today;
use crate::models::{
    RecurringQuery, RecurringTask, RecurringTaskStatus, SuccessResponse, TaskResponse, TasksResponse,
    ToggleCompletionPayload, UpsertRecurringTaskPayload,
};
use crate::routes::{blocking, ApiError};
use crate::AppState;

pub async fn list_recurring(
    State(state): State<AppState>,
    Query(query): Query<RecurringQuery>,
) -> Result<Json<TasksResponse<RecurringTaskStatus>>, ApiError> {
    let date = match query.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("date must be YYYY-MM-DD, got '{raw}'")))?,
        None => today(),
    };

    match blocking(&state.core, move |core| core.list_recurring(date)).await {
        Ok(tasks) => Ok(Json(TasksResponse { tasks })),
        Err(error) => {
            tracing::error!(error = %error, %date, "failed to list recurring tasks");
            Ok(Json(TasksResponse { tasks: Vec::new() }))
        }
    }
}

pub async fn upsert_recurring(
    State(state): State<AppState>,
    payload: Result<Json<UpsertRecurringTaskPayload>, JsonRejection>,
) -> Result<Json<TaskResponse<RecurringTask>>, ApiError> {
    let Json(payload) = payload?;
    let task = blocking(&state.core, move |core| core.upsert_recurring(payload)).await?;
    Ok(Json(TaskResponse { task }))
}

/// Toggles today's completion for one recurring task.
pub async fn toggle_completion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ToggleCompletionPayload>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(payload) = payload?;
    let date = today();
    blocking(&state.core, move |core| core.set_completion(&id, payload.completed, date)).await?;
    Ok(Json(SuccessResponse { success: true }))
}
