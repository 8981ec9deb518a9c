use crate::config::Config;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateTaskPayload, CreateTopicPayload, CronJob, DailyCompletion, ListTasksFilters, RecurringTask,
    RecurringTaskStatus, ResearchTopic, Task, UpdateTaskPayload, UpsertRecurringTaskPayload,
};
use crate::topics::{self, TopicStore};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Owns the relational store and the topic file; every HTTP operation goes through here.
#[derive(Debug)]
pub struct DashboardCore {
    db: Database,
    topics: TopicStore,
}

impl DashboardCore {
    pub fn new(config: &Config) -> AppResult<Arc<Self>> {
        std::fs::create_dir_all(&config.data_dir).map_err(|error| AppError::Io(error.to_string()))?;
        Self::open(&config.db_path, &config.topics_path)
    }

    pub fn open(db_path: &Path, topics_path: &Path) -> AppResult<Arc<Self>> {
        let db = Database::new(db_path)?;
        let topics = TopicStore::new(topics_path);

        match topics.ensure_initialized() {
            Ok(count) => tracing::info!(
                path = %topics.path().display(),
                count,
                "research topics ready"
            ),
            Err(error) => tracing::warn!(error = %error, "failed to initialize research topics"),
        }
        tracing::info!(path = %db.path().display(), "database ready");

        Ok(Arc::new(Self { db, topics }))
    }

    pub fn topic_store(&self) -> &TopicStore {
        &self.topics
    }

    pub fn list_topics(&self) -> AppResult<Vec<ResearchTopic>> {
        topics::list_topics(&self.topics)
    }

    pub fn create_topic(&self, payload: CreateTopicPayload) -> AppResult<ResearchTopic> {
        let topic = topics::create_topic(&self.topics, payload, Utc::now())?;
        tracing::info!(topic_id = %topic.id, "research topic created");
        Ok(topic)
    }

    pub fn update_topic(
        &self,
        topic_id: &str,
        body: Map<String, Value>,
    ) -> AppResult<ResearchTopic> {
        topics::update_topic(&self.topics, topic_id, body, Utc::now())
    }

    pub fn delete_topic(&self, topic_id: &str) -> AppResult<bool> {
        let removed = topics::delete_topic(&self.topics, topic_id)?;
        if removed {
            tracing::info!(topic_id, "research topic deleted");
        }
        Ok(removed)
    }

    pub fn list_tasks(&self, filters: &ListTasksFilters) -> AppResult<Vec<Task>> {
        self.db.list_tasks(filters)
    }

    pub fn create_task(&self, payload: CreateTaskPayload) -> AppResult<Task> {
        if payload.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        self.db.insert_task(&payload)
    }

    pub fn update_task(&self, task_id: &str, patch: UpdateTaskPayload) -> AppResult<Task> {
        if patch.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
            return Err(AppError::Validation("Title cannot be empty".to_string()));
        }
        self.db
            .update_task(task_id, &patch)?
            .ok_or_else(|| AppError::NotFound(format!("task {task_id}")))
    }

    pub fn list_recurring(&self, date: NaiveDate) -> AppResult<Vec<RecurringTaskStatus>> {
        self.db.list_recurring_tasks(date)
    }

    pub fn upsert_recurring(&self, payload: UpsertRecurringTaskPayload) -> AppResult<RecurringTask> {
        if payload.cron_job_id.trim().is_empty() || payload.name.trim().is_empty() {
            return Err(AppError::Validation("cron_job_id and name are required".to_string()));
        }
        self.db.upsert_recurring_task(&payload)
    }

    /// Marks `recurring_task_id` done or not done for `date`.
    ///
    /// Completing twice is a no-op on the completion row; `last_completed` is
    /// refreshed on every completion and is not written atomically with it.
    pub fn set_completion(&self, recurring_task_id: &str, completed: bool, date: NaiveDate) -> AppResult<()> {
        if self.db.get_recurring_task(recurring_task_id)?.is_none() {
            return Err(AppError::NotFound(format!("recurring task {recurring_task_id}")));
        }

        if completed {
            let inserted = self.db.insert_completion(recurring_task_id, date)?;
            if !inserted {
                tracing::debug!(recurring_task_id, %date, "completion already recorded");
            }
            self.db.set_last_completed(recurring_task_id, Utc::now())?;
        } else {
            self.db.delete_completion(recurring_task_id, date)?;
        }
        Ok(())
    }

    pub fn completions(&self, recurring_task_id: &str) -> AppResult<Vec<DailyCompletion>> {
        self.db.list_completions(recurring_task_id)
    }

    /// Upserts every job pushed by the cron system. Returns how many were stored.
    pub fn sync_cron_jobs(&self, jobs: Vec<Value>) -> usize {
        let mut synced = 0;
        for raw in jobs {
            let job: CronJob = match serde_json::from_value(raw) {
                Ok(job) => job,
                Err(error) => {
                    tracing::warn!(error = %error, "skipping malformed cron job");
                    continue;
                }
            };

            match self.db.upsert_recurring_task(&recurring_payload(job)) {
                Ok(_) => synced += 1,
                Err(error) => tracing::error!(error = %error, "failed to upsert recurring task"),
            }
        }
        synced
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn recurring_payload(job: CronJob) -> UpsertRecurringTaskPayload {
    let schedule = job
        .schedule
        .expr
        .or(job.schedule.kind)
        .unwrap_or_else(|| "unknown".to_string());
    let next_run = job
        .state
        .and_then(|state| state.next_run_at_ms)
        .and_then(format_next_run);

    UpsertRecurringTaskPayload {
        cron_job_id: job.id,
        name: job.name,
        schedule: Some(schedule),
        enabled: Some(job.enabled),
        next_run,
    }
}

// Wall-clock time of the next run, e.g. "09:30 AM".
fn format_next_run(millis: i64) -> Option<String> {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|at| at.format("%I:%M %p").to_string())
}
