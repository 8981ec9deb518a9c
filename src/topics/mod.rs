mod patch;
mod seed;
mod store;

pub use patch::TopicPatch;
pub use store::TopicStore;

use crate::errors::{AppError, AppResult};
use crate::models::{CreateTopicPayload, ResearchTopic};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use uuid::Uuid;

/// Topics in queue order: active first, least recently used next, then by title.
pub fn list_topics(store: &TopicStore) -> AppResult<Vec<ResearchTopic>> {
    let mut topics = store.load()?;
    sort_topics(&mut topics);
    Ok(topics)
}

pub fn sort_topics(topics: &mut [ResearchTopic]) {
    topics.sort_by(compare_topics);
}

fn compare_topics(a: &ResearchTopic, b: &ResearchTopic) -> Ordering {
    b.active
        .cmp(&a.active)
        .then_with(|| last_used_millis(a).cmp(&last_used_millis(b)))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.title.cmp(&b.title))
}

// Never-used topics count as used at the epoch.
fn last_used_millis(topic: &ResearchTopic) -> i64 {
    topic
        .last_used_at
        .map(|value| value.timestamp_millis())
        .unwrap_or(0)
}

pub fn create_topic(
    store: &TopicStore,
    payload: CreateTopicPayload,
    now: DateTime<Utc>,
) -> AppResult<ResearchTopic> {
    let title = payload.title.as_deref().unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let topic = ResearchTopic {
        id: Uuid::new_v4().to_string(),
        title,
        category: payload.category.unwrap_or_default(),
        notes: Some(payload.notes.unwrap_or_default()),
        links: payload.links.unwrap_or_default(),
        active: payload.active.unwrap_or(true),
        created_at: now,
        updated_at: now,
        last_used_at: payload.last_used_at,
        used_count: 0,
    };

    let mut topics = store.load()?;
    topics.insert(0, topic.clone());
    store.save(&topics)?;
    Ok(topic)
}

/// Applies a raw patch body. A missing id is reported before the body is validated.
pub fn update_topic(
    store: &TopicStore,
    topic_id: &str,
    body: Map<String, Value>,
    now: DateTime<Utc>,
) -> AppResult<ResearchTopic> {
    let mut topics = store.load()?;
    let topic = topics
        .iter_mut()
        .find(|topic| topic.id == topic_id)
        .ok_or_else(|| AppError::NotFound(format!("topic {topic_id}")))?;

    TopicPatch::from_json(body)?.apply(topic, now);
    let updated = topic.clone();

    store.save(&topics)?;
    Ok(updated)
}

/// Removes the topic if present. Returns whether anything was removed.
pub fn delete_topic(store: &TopicStore, topic_id: &str) -> AppResult<bool> {
    let topics = store.load()?;
    let before = topics.len();
    let remaining: Vec<ResearchTopic> = topics
        .into_iter()
        .filter(|topic| topic.id != topic_id)
        .collect();

    if remaining.len() == before {
        return Ok(false);
    }
    store.save(&remaining)?;
    Ok(true)
}
