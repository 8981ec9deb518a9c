use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateTaskPayload, DailyCompletion, ListTasksFilters, RecurringTask, RecurringTaskStatus, Task, TaskPriority,
    TaskStatus, UpdateTaskPayload, UpsertRecurringTaskPayload,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, created_at, updated_at, completed_at, source, dev_notes";

const RECURRING_COLUMNS: &str =
    "id, cron_job_id, name, schedule, enabled, next_run, last_completed, created_at, updated_at";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    pub fn list_tasks(&self, filters: &ListTasksFilters) -> AppResult<Vec<Task>> {
        let conn = self.lock()?;
        let mut query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1 = 1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filters.status {
            query.push_str(" AND status = ?");
            params_vec.push(Box::new(status.as_str()));
        }

        // Actionable lists read oldest first so the backlog drains in order.
        let oldest_first = filters.oldest.unwrap_or(false) || filters.status == Some(TaskStatus::Todo);
        if oldest_first {
            query.push_str(" ORDER BY created_at ASC");
        } else {
            query.push_str(" ORDER BY created_at DESC");
        }

        if let Some(limit) = filters.limit {
            query.push_str(" LIMIT ?");
            params_vec.push(Box::new(limit));
        }

        let mut statement = conn.prepare(&query)?;
        let rows = statement.query_map(
            rusqlite::params_from_iter(params_vec.iter().map(|param| param.as_ref())),
            parse_task_row,
        )?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn insert_task(&self, payload: &CreateTaskPayload) -> AppResult<Task> {
        let now = now_micros();
        let status = payload.status.unwrap_or_default();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: payload.title.trim().to_string(),
            description: payload.description.clone(),
            status,
            priority: payload.priority,
            created_at: now,
            updated_at: now,
            completed_at: (status == TaskStatus::Done).then_some(now),
            source: Some(payload.source.clone().unwrap_or_else(|| "manual".to_string())),
            dev_notes: None,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (id, title, description, status, priority, created_at, updated_at, completed_at, source, dev_notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.map(TaskPriority::as_str),
                format_time(task.created_at),
                format_time(task.updated_at),
                task.completed_at.map(format_time),
                task.source,
                task.dev_notes,
            ],
        )?;
        Ok(task)
    }

    /// Applies the present fields of `patch`. Returns `None` when the task does not exist.
    pub fn update_task(&self, task_id: &str, patch: &UpdateTaskPayload) -> AppResult<Option<Task>> {
        let conn = self.lock()?;
        let Some(mut task) = select_task(&conn, task_id)? else {
            return Ok(None);
        };

        let now = now_micros();
        if let Some(title) = &patch.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(priority) = patch.priority {
            task.priority = Some(priority);
        }
        if let Some(dev_notes) = &patch.dev_notes {
            task.dev_notes = Some(dev_notes.clone());
        }
        if let Some(status) = patch.status {
            if status == TaskStatus::Done && task.status != TaskStatus::Done {
                task.completed_at = Some(now);
            } else if status != TaskStatus::Done && status != TaskStatus::Archive {
                task.completed_at = None;
            }
            task.status = status;
        }
        task.updated_at = now;

        conn.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, status = ?3, priority = ?4, updated_at = ?5,
                 completed_at = ?6, dev_notes = ?7
             WHERE id = ?8",
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.map(TaskPriority::as_str),
                format_time(task.updated_at),
                task.completed_at.map(format_time),
                task.dev_notes,
                task.id,
            ],
        )?;
        Ok(Some(task))
    }

    /// Recurring tasks ordered by name, flagged with whether `date` has a completion.
    pub fn list_recurring_tasks(&self, date: NaiveDate) -> AppResult<Vec<RecurringTaskStatus>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT r.id, r.cron_job_id, r.name, r.schedule, r.enabled, r.next_run, r.last_completed,
                    r.created_at, r.updated_at,
                    EXISTS (
                      SELECT 1 FROM daily_completions c
                      WHERE c.recurring_task_id = r.id AND c.date = ?1
                    )
             FROM recurring_tasks r
             ORDER BY r.name ASC",
        )?;
        let rows = statement.query_map([format_date(date)], |row| {
            Ok(RecurringTaskStatus {
                task: parse_recurring_row(row)?,
                completed_today: row.get(9)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_recurring_task(&self, recurring_task_id: &str) -> AppResult<Option<RecurringTask>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {RECURRING_COLUMNS} FROM recurring_tasks WHERE id = ?1"),
            [recurring_task_id],
            parse_recurring_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Inserts or refreshes the recurring task keyed by `cron_job_id`.
    pub fn upsert_recurring_task(&self, payload: &UpsertRecurringTaskPayload) -> AppResult<RecurringTask> {
        let now = format_time(now_micros());
        let schedule = payload
            .schedule
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO recurring_tasks (id, cron_job_id, name, schedule, enabled, next_run, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(cron_job_id) DO UPDATE SET
               name = excluded.name,
               schedule = excluded.schedule,
               enabled = excluded.enabled,
               next_run = excluded.next_run,
               updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                payload.cron_job_id,
                payload.name,
                schedule,
                payload.enabled.unwrap_or(true),
                payload.next_run,
                now,
            ],
        )?;

        conn.query_row(
            &format!("SELECT {RECURRING_COLUMNS} FROM recurring_tasks WHERE cron_job_id = ?1"),
            [&payload.cron_job_id],
            parse_recurring_row,
        )
        .map_err(AppError::from)
    }

    /// Records a completion for `(recurring_task_id, date)`.
    ///
    /// Returns `false` when the pair already exists; the unique constraint is the
    /// source of idempotency.
    pub fn insert_completion(&self, recurring_task_id: &str, date: NaiveDate) -> AppResult<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO daily_completions (id, recurring_task_id, date, completed_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                recurring_task_id,
                format_date(date),
                format_time(now_micros()),
            ],
        );

        match inserted {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Removes the completion for `(recurring_task_id, date)`. Returns whether a row existed.
    pub fn delete_completion(&self, recurring_task_id: &str, date: NaiveDate) -> AppResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM daily_completions WHERE recurring_task_id = ?1 AND date = ?2",
            params![recurring_task_id, format_date(date)],
        )?;
        Ok(deleted > 0)
    }

    pub fn set_last_completed(&self, recurring_task_id: &str, at: DateTime<Utc>) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE recurring_tasks SET last_completed = ?1 WHERE id = ?2",
            params![format_time(at), recurring_task_id],
        )?;
        Ok(())
    }

    pub fn list_completions(&self, recurring_task_id: &str) -> AppResult<Vec<DailyCompletion>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT id, recurring_task_id, date, completed_at
             FROM daily_completions
             WHERE recurring_task_id = ?1
             ORDER BY date DESC",
        )?;
        let rows = statement.query_map([recurring_task_id], |row| {
            Ok(DailyCompletion {
                id: row.get(0)?,
                recurring_task_id: row.get(1)?,
                date: parse_date(&row.get::<_, String>(2)?)?,
                completed_at: parse_time(&row.get::<_, String>(3)?)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn select_task(conn: &Connection, task_id: &str) -> AppResult<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        [task_id],
        parse_task_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn parse_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_task_status(&row.get::<_, String>(3)?)?,
        priority: row
            .get::<_, Option<String>>(4)?
            .map(|raw| parse_task_priority(&raw))
            .transpose()?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        updated_at: parse_time(&row.get::<_, String>(6)?)?,
        completed_at: row
            .get::<_, Option<String>>(7)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        source: row.get(8)?,
        dev_notes: row.get(9)?,
    })
}

fn parse_recurring_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecurringTask> {
    Ok(RecurringTask {
        id: row.get(0)?,
        cron_job_id: row.get(1)?,
        name: row.get(2)?,
        schedule: row.get(3)?,
        enabled: row.get(4)?,
        next_run: row.get(5)?,
        last_completed: row
            .get::<_, Option<String>>(6)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
        updated_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

fn parse_task_status(raw: &str) -> rusqlite::Result<TaskStatus> {
    match raw {
        "todo" => Ok(TaskStatus::Todo),
        "in_progress" => Ok(TaskStatus::InProgress),
        "done" => Ok(TaskStatus::Done),
        "archive" => Ok(TaskStatus::Archive),
        other => Err(conversion_failure(format!("unknown task status: {other}"))),
    }
}

fn parse_task_priority(raw: &str) -> rusqlite::Result<TaskPriority> {
    match raw {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        other => Err(conversion_failure(format!("unknown task priority: {other}"))),
    }
}

// Fixed-width UTC text keeps ORDER BY on timestamp columns chronological.
fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| conversion_failure(error.to_string()))
}

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| conversion_failure(error.to_string()))
}

fn conversion_failure(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}
