use std::fs;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use rusty_dashboard_lib::models::ResearchTopic;
use rusty_dashboard_lib::{router, AppState, DashboardCore};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct Harness {
    dir: TempDir,
    core: Arc<DashboardCore>,
    app: Router,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let topics_path = dir.path().join("data").join("research-topics.json");
        Self::with_topics_path(dir, topics_path)
    }

    fn with_topics_path(dir: TempDir, topics_path: std::path::PathBuf) -> Self {
        let core = DashboardCore::open(&dir.path().join("rusty.sqlite"), &topics_path).expect("core");
        let app = router(AppState { core: core.clone() });
        Self { dir, core, app }
    }

    fn stored_topics(&self) -> Vec<ResearchTopic> {
        let raw = fs::read(self.core.topic_store().path()).expect("read topics file");
        serde_json::from_slice(&raw).expect("parse topics file")
    }

    fn topics_bytes(&self) -> Vec<u8> {
        fs::read(self.core.topic_store().path()).expect("read topics file")
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn create_recurring(&self, cron_job_id: &str, name: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/recurring",
                Some(json!({ "cron_job_id": cron_job_id, "name": name, "schedule": "0 7 * * *" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["task"]["id"].as_str().expect("recurring id").to_string()
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let harness = Harness::new();
    let (status, body) = harness.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn topics_list_returns_seeded_queue() {
    let harness = Harness::new();
    let (status, body) = harness.send("GET", "/api/research-topics", None).await;

    assert_eq!(status, StatusCode::OK);
    let topics = body["topics"].as_array().expect("topics array");
    assert_eq!(topics.len(), 10);
    assert!(topics.iter().all(|topic| topic["active"] == json!(true)));
    assert!(topics.iter().all(|topic| topic["usedCount"] == json!(0)));
}

#[tokio::test]
async fn create_topic_trims_title_and_prepends() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(
            "POST",
            "/api/research-topics",
            Some(json!({
                "title": "  Foo  ",
                "category": "trading",
                "links": ["https://a.example", "https://a.example"]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"]["title"], json!("Foo"));
    assert_eq!(body["topic"]["category"], json!("trading"));
    assert_eq!(body["topic"]["notes"], json!(""));
    assert_eq!(body["topic"]["active"], json!(true));

    let stored = harness.stored_topics();
    assert_eq!(stored.len(), 11);
    assert_eq!(stored[0].title, "Foo");
    assert_eq!(stored[0].links.len(), 2);
}

#[tokio::test]
async fn create_topic_coerces_loose_fields() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(
            "POST",
            "/api/research-topics",
            Some(json!({ "title": 2026, "links": "https://one.example", "active": null })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"]["title"], json!("2026"));
    assert_eq!(body["topic"]["links"], json!([]));
    assert_eq!(body["topic"]["active"], json!(true));
    assert_eq!(harness.stored_topics()[0].title, "2026");
}

#[tokio::test]
async fn blank_topic_title_is_a_bad_request() {
    let harness = Harness::new();
    let before = harness.topics_bytes();

    let (status, body) = harness
        .send("POST", "/api/research-topics", Some(json!({ "title": "   " })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Title is required"));
    assert_eq!(harness.topics_bytes(), before);
}

#[tokio::test]
async fn bump_patch_increments_used_count_only() {
    let harness = Harness::new();
    let original = harness.stored_topics()[3].clone();

    let (status, body) = harness
        .send(
            "PATCH",
            &format!("/api/research-topics/{}", original.id),
            Some(json!({ "bumpUsedCount": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"]["usedCount"], json!(1));

    let updated = harness
        .stored_topics()
        .into_iter()
        .find(|topic| topic.id == original.id)
        .expect("topic still stored");
    assert_eq!(updated.used_count, 1);
    assert!(updated.updated_at >= original.updated_at);
    assert_eq!(updated.title, original.title);
    assert_eq!(updated.category, original.category);
    assert_eq!(updated.notes, original.notes);
    assert_eq!(updated.active, original.active);
}

#[tokio::test]
async fn patch_applies_sparse_fields() {
    let harness = Harness::new();
    let original = harness.stored_topics()[0].clone();

    let (status, body) = harness
        .send(
            "PATCH",
            &format!("/api/research-topics/{}", original.id),
            Some(json!({
                "active": false,
                "lastUsedAt": "2026-10-16T08:00:00Z",
                "links": ["https://b.example"]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"]["active"], json!(false));
    assert_eq!(body["topic"]["links"], json!(["https://b.example"]));
    assert_eq!(body["topic"]["title"], json!(original.title));
    assert!(body["topic"]["lastUsedAt"].is_string());

    let (_, listed) = harness.send("GET", "/api/research-topics", None).await;
    let last = listed["topics"].as_array().expect("topics").last().cloned().expect("last");
    assert_eq!(last["id"], json!(original.id));
}

#[tokio::test]
async fn patch_missing_topic_is_not_found_and_file_unchanged() {
    let harness = Harness::new();
    let before = harness.topics_bytes();

    let (status, body) = harness
        .send("PATCH", "/api/research-topics/nope", Some(json!({ "title": "x" })))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    assert_eq!(harness.topics_bytes(), before);
}

#[tokio::test]
async fn patch_missing_topic_with_invalid_body_is_not_found() {
    let harness = Harness::new();
    let (status, _) = harness
        .send("PATCH", "/api/research-topics/nope", Some(json!({ "usedCount": 50 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_rejects_unrecognized_fields() {
    let harness = Harness::new();
    let id = harness.stored_topics()[0].id.clone();

    let (status, _) = harness
        .send("PATCH", &format!("/api/research-topics/{id}"), Some(json!({ "priority": "high" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = harness
        .send("PATCH", &format!("/api/research-topics/{id}"), Some(json!({ "usedCount": 50 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_topic_removes_it_and_missing_id_is_ok() {
    let harness = Harness::new();
    let id = harness.stored_topics()[0].id.clone();

    let (status, body) = harness.send("DELETE", &format!("/api/research-topics/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(harness.stored_topics().len(), 9);

    let before = harness.topics_bytes();
    let (status, body) = harness.send("DELETE", "/api/research-topics/missing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(harness.topics_bytes(), before);
}

#[tokio::test]
async fn topic_routes_live_under_research_topics() {
    let harness = Harness::new();
    let (status, _) = harness.send("GET", "/api/topics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn topic_list_degrades_to_empty_when_store_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocked = dir.path().join("blocked");
    fs::create_dir_all(blocked.join("occupied")).expect("mkdir");
    let harness = Harness::with_topics_path(dir, blocked);

    let (status, body) = harness.send("GET", "/api/research-topics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "topics": [] }));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let harness = Harness::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/research-topics")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .expect("request");

    let response = harness.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completing_twice_keeps_one_record() {
    let harness = Harness::new();
    let id = harness.create_recurring("cron-stretch", "Stretch").await;
    let uri = format!("/api/recurring/{id}/complete");

    for _ in 0..2 {
        let (status, body) = harness.send("POST", &uri, Some(json!({ "completed": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }
    assert_eq!(harness.core.completions(&id).expect("completions").len(), 1);

    let (_, listed) = harness.send("GET", "/api/recurring", None).await;
    assert_eq!(listed["tasks"][0]["completed_today"], json!(true));
    assert!(listed["tasks"][0]["last_completed"].is_string());
}

#[tokio::test]
async fn complete_then_incomplete_leaves_no_record() {
    let harness = Harness::new();
    let id = harness.create_recurring("cron-journal", "Journal").await;
    let uri = format!("/api/recurring/{id}/complete");

    let (status, _) = harness.send("POST", &uri, Some(json!({ "completed": true }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = harness.send("POST", &uri, Some(json!({ "completed": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    assert!(harness.core.completions(&id).expect("completions").is_empty());
}

#[tokio::test]
async fn completing_unknown_recurring_task_is_not_found() {
    let harness = Harness::new();
    let (status, _) = harness
        .send("POST", "/api/recurring/missing/complete", Some(json!({ "completed": true })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recurring_list_rejects_malformed_date() {
    let harness = Harness::new();
    let (status, _) = harness.send("GET", "/api/recurring?date=17-10-2026", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = harness.send("GET", "/api/recurring?date=2026-10-17", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "tasks": [] }));
}

#[tokio::test]
async fn sync_requires_array_and_upserts_jobs() {
    let harness = Harness::new();

    let (status, body) = harness
        .send("POST", "/api/sync", Some(json!({ "cron_jobs": "nope" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("cron_jobs must be an array"));

    let jobs = json!({
        "cron_jobs": [
            { "id": "job-1", "name": "Weekly review", "schedule": { "expr": "0 9 * * 1" }, "enabled": true },
            { "id": "job-2", "name": "Backups", "schedule": { "kind": "every" }, "enabled": true }
        ]
    });
    let (status, body) = harness.send("POST", "/api/sync", Some(jobs.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "synced": 2 }));

    let (_, body) = harness.send("POST", "/api/sync", Some(jobs)).await;
    assert_eq!(body["synced"], json!(2));

    let (_, listed) = harness.send("GET", "/api/recurring", None).await;
    let names: Vec<&str> = listed["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .map(|task| task["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Backups", "Weekly review"]);
}

#[tokio::test]
async fn task_board_create_move_and_filter() {
    let harness = Harness::new();

    let (status, body) = harness
        .send("POST", "/api/tasks", Some(json!({ "title": "Write docs", "priority": "high" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], json!("todo"));
    assert_eq!(body["task"]["source"], json!("manual"));
    let id = body["task"]["id"].as_str().expect("task id").to_string();

    let (status, body) = harness
        .send("PATCH", &format!("/api/tasks/{id}"), Some(json!({ "status": "done", "dev_notes": "shipped" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], json!("done"));
    assert!(body["task"]["completed_at"].is_string());

    let (_, todo) = harness.send("GET", "/api/tasks?status=todo", None).await;
    assert_eq!(todo, json!({ "tasks": [] }));

    let (_, done) = harness.send("GET", "/api/tasks?status=done&limit=5", None).await;
    assert_eq!(done["tasks"].as_array().expect("tasks").len(), 1);

    let (status, _) = harness
        .send("PATCH", "/api/tasks/missing", Some(json!({ "status": "todo" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = harness.send("POST", "/api/tasks", Some(json!({ "title": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = harness.send("GET", "/api/tasks?status=someday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(harness.dir.path().join("rusty.sqlite").exists());
}
