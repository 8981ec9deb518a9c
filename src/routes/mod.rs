mod audit;
mod error;
mod health;
mod recurring;
mod sync;
mod tasks;
mod topics;

use crate::dashboard::DashboardCore;
use crate::errors::AppResult;
use crate::AppState;
use axum::middleware as axum_mw;
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub use error::ApiError;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/research-topics",
            get(topics::list_topics).post(topics::create_topic),
        )
        .route(
            "/api/research-topics/{id}",
            patch(topics::update_topic).delete(topics::delete_topic),
        )
        .route(
            "/api/recurring",
            get(recurring::list_recurring).post(recurring::upsert_recurring),
        )
        .route("/api/recurring/{id}/complete", post(recurring::toggle_completion))
        .route("/api/sync", post(sync::sync_cron_jobs))
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/{id}", patch(tasks::update_task))
        .layer(axum_mw::from_fn(audit::audit_log))
        .layer(cors)
        .with_state(state)
}

/// Runs storage work on the blocking pool; file and SQLite calls are synchronous.
async fn blocking<T, F>(core: &Arc<DashboardCore>, work: F) -> AppResult<T>
where
    F: FnOnce(&DashboardCore) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let core = Arc::clone(core);
    tokio::task::spawn_blocking(move || work(core.as_ref())).await?
}
