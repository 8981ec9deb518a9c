use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;

use crate::models::{CreateTaskPayload, ListTasksFilters, Task, TaskResponse, TasksResponse, UpdateTaskPayload};
use crate::routes::{blocking, ApiError};
use crate::AppState;

pub async fn list_tasks(
    State(state): State<AppState>,
    filters: Result<Query<ListTasksFilters>, QueryRejection>,
) -> Result<Json<TasksResponse<Task>>, ApiError> {
    let Query(filters) = filters?;
    match blocking(&state.core, move |core| core.list_tasks(&filters)).await {
        Ok(tasks) => Ok(Json(TasksResponse { tasks })),
        Err(error) => {
            tracing::error!(error = %error, "failed to list tasks");
            Ok(Json(TasksResponse { tasks: Vec::new() }))
        }
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskPayload>, JsonRejection>,
) -> Result<Json<TaskResponse<Task>>, ApiError> {
    let Json(payload) = payload?;
    let task = blocking(&state.core, move |core| core.create_task(payload)).await?;
    Ok(Json(TaskResponse { task }))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskPayload>, JsonRejection>,
) -> Result<Json<TaskResponse<Task>>, ApiError> {
    let Json(patch) = payload?;
    let task = blocking(&state.core, move |core| core.update_task(&id, patch)).await?;
    Ok(Json(TaskResponse { task }))
}
