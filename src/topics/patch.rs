use crate::errors::{AppError, AppResult};
use crate::models::{self, CreateTopicPayload, ResearchTopic, TopicCategory};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Sparse update for a research topic.
///
/// Only fields present in the request body are set. `last_used_at` is doubly
/// optional: `Some(None)` clears the timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicPatch {
    pub title: Option<String>,
    pub category: Option<TopicCategory>,
    pub notes: Option<String>,
    pub links: Option<Vec<String>>,
    pub active: Option<bool>,
    pub last_used_at: Option<Option<DateTime<Utc>>>,
    pub bump_used_count: bool,
}

const SERVER_MANAGED: &[&str] = &["id", "createdAt", "updatedAt", "usedCount"];

impl TopicPatch {
    pub fn from_json(body: Map<String, Value>) -> AppResult<Self> {
        let mut patch = Self::default();

        for (key, value) in body {
            match key.as_str() {
                "title" => {
                    let title = coerce_text(&value, "title")?.trim().to_string();
                    if title.is_empty() {
                        return Err(AppError::Validation("Title is required".to_string()));
                    }
                    patch.title = Some(title);
                }
                "category" => patch.category = Some(parse_category(&value)?),
                "notes" => patch.notes = Some(coerce_text(&value, "notes")?),
                "links" => patch.links = Some(coerce_links(&value)),
                "active" => patch.active = Some(is_truthy(&value)),
                "lastUsedAt" => patch.last_used_at = Some(parse_last_used_at(&value)?),
                "bumpUsedCount" => patch.bump_used_count = is_truthy(&value),
                managed if SERVER_MANAGED.contains(&managed) => {
                    return Err(AppError::Validation(format!("{managed} cannot be patched")));
                }
                unknown => {
                    return Err(AppError::Validation(format!("Unknown field: {unknown}")));
                }
            }
        }

        Ok(patch)
    }

    /// Writes the present fields onto `topic` and stamps `updated_at`.
    pub fn apply(self, topic: &mut ResearchTopic, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            topic.title = title;
        }
        if let Some(category) = self.category {
            topic.category = category;
        }
        if let Some(notes) = self.notes {
            topic.notes = Some(notes);
        }
        if let Some(links) = self.links {
            topic.links = links;
        }
        if let Some(active) = self.active {
            topic.active = active;
        }
        if let Some(last_used_at) = self.last_used_at {
            topic.last_used_at = last_used_at;
        }
        if self.bump_used_count {
            topic.used_count = topic.used_count.saturating_add(1);
        }
        topic.updated_at = now;
    }
}

impl CreateTopicPayload {
    /// Reads a create body with the same coercions as a patch. Falsy optional
    /// fields fall back to defaults, and fields a create does not use are ignored.
    pub fn from_json(body: &Map<String, Value>) -> AppResult<Self> {
        let present = |key: &str| body.get(key).filter(|value| is_truthy(value));

        Ok(Self {
            title: present("title")
                .map(|value| coerce_text(value, "title"))
                .transpose()?,
            category: present("category").map(parse_category).transpose()?,
            notes: present("notes")
                .map(|value| coerce_text(value, "notes"))
                .transpose()?,
            links: body.get("links").map(coerce_links),
            active: body.get("active").filter(|value| !value.is_null()).map(is_truthy),
            last_used_at: body
                .get("lastUsedAt")
                .map(parse_last_used_at)
                .transpose()?
                .flatten(),
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn coerce_text(value: &Value, field: &str) -> AppResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Array(_) | Value::Object(_) => {
            Err(AppError::Validation(format!("{field} must be text")))
        }
    }
}

fn coerce_links(value: &Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        })
        .collect()
}

fn parse_category(value: &Value) -> AppResult<TopicCategory> {
    value
        .as_str()
        .and_then(TopicCategory::parse)
        .ok_or_else(|| AppError::Validation(format!("Unknown category: {value}")))
}

fn parse_last_used_at(value: &Value) -> AppResult<Option<DateTime<Utc>>> {
    if !is_truthy(value) {
        return Ok(None);
    }
    let raw = value
        .as_str()
        .ok_or_else(|| AppError::Validation("lastUsedAt must be an ISO-8601 string".to_string()))?;
    models::parse_timestamp(raw)
        .map(Some)
        .ok_or_else(|| AppError::Validation(format!("lastUsedAt is not ISO-8601: {raw}")))
}
