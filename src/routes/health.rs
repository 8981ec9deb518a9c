use axum::Json;

use crate::models::OkResponse;

pub async fn health_check() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}
