use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    MlAi,
    Trading,
    AppDev,
    Marketing,
    WorkflowTools,
    #[default]
    Other,
}

impl TopicCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ml_ai" => Some(Self::MlAi),
            "trading" => Some(Self::Trading),
            "app_dev" => Some(Self::AppDev),
            "marketing" => Some(Self::Marketing),
            "workflow_tools" => Some(Self::WorkflowTools),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// One entry of the research queue persisted in the topics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchTopic {
    pub id: String,
    pub title: String,
    pub category: TopicCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "deserialize_last_used_at",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub used_count: u32,
}

/// Accepts RFC 3339 as well as the looser forms other writers of the topic
/// file produce: a bare `YYYY-MM-DD` date or a zone-less date-time, both read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_last_used_at<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid lastUsedAt: {raw}"))),
    }
}

/// Normalized create request; see `CreateTopicPayload::from_json` for how a raw body maps onto it.
#[derive(Debug, Clone, Default)]
pub struct CreateTopicPayload {
    pub title: Option<String>,
    pub category: Option<TopicCategory>,
    pub notes: Option<String>,
    pub links: Option<Vec<String>>,
    pub active: Option<bool>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Archive,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Archive => "archive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<TaskPriority>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub dev_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksFilters {
    pub status: Option<TaskStatus>,
    pub limit: Option<u32>,
    pub oldest: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskPayload {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTaskPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub dev_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTask {
    pub id: String,
    pub cron_job_id: String,
    pub name: String,
    pub schedule: String,
    pub enabled: bool,
    pub next_run: Option<String>,
    pub last_completed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recurring task as shown on the daily checklist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringTaskStatus {
    #[serde(flatten)]
    pub task: RecurringTask,
    pub completed_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCompletion {
    pub id: String,
    pub recurring_task_id: String,
    pub date: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertRecurringTaskPayload {
    pub cron_job_id: String,
    pub name: String,
    pub schedule: Option<String>,
    pub enabled: Option<bool>,
    pub next_run: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleCompletionPayload {
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecurringQuery {
    pub date: Option<String>,
}

/// Job definition pushed by the upstream cron system.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub schedule: CronSchedule,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub state: Option<CronJobState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CronSchedule {
    pub expr: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobState {
    pub next_run_at_ms: Option<i64>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncPayload {
    #[serde(default)]
    pub cron_jobs: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicsResponse {
    pub topics: Vec<ResearchTopic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicResponse {
    pub topic: ResearchTopic,
}

#[derive(Debug, Clone, Serialize)]
pub struct TasksResponse<T> {
    pub tasks: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse<T> {
    pub task: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub synced: usize,
}
