use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{Map, Value};

use crate::models::{CreateTopicPayload, OkResponse, TopicResponse, TopicsResponse};
use crate::routes::{blocking, ApiError};
use crate::AppState;

/// Read path favors availability: a storage failure yields an empty list.
pub async fn list_topics(State(state): State<AppState>) -> Json<TopicsResponse> {
    match blocking(&state.core, |core| core.list_topics()).await {
        Ok(topics) => Json(TopicsResponse { topics }),
        Err(error) => {
            tracing::error!(error = %error, "failed to load research topics");
            Json(TopicsResponse { topics: Vec::new() })
        }
    }
}

pub async fn create_topic(
    State(state): State<AppState>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<TopicResponse>, ApiError> {
    let Json(body) = payload?;
    let payload = CreateTopicPayload::from_json(&body)?;
    let topic = blocking(&state.core, move |core| core.create_topic(payload)).await?;
    Ok(Json(TopicResponse { topic }))
}

pub async fn update_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<TopicResponse>, ApiError> {
    let Json(body) = payload?;
    let topic = blocking(&state.core, move |core| core.update_topic(&id, body)).await?;
    Ok(Json(TopicResponse { topic }))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    blocking(&state.core, move |core| core.delete_topic(&id)).await?;
    Ok(Json(OkResponse { ok: true }))
}
