use crate::models::{ResearchTopic, TopicCategory};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const DEFAULT_TOPICS: &[(&str, TopicCategory, &str)] = &[
    (
        "QuizzyDots growth: what actually works in 2026 for daily games (Reddit, SEO, share cards, retention loops)",
        TopicCategory::Marketing,
        "Focus on actionable channels + simple experiments we can run this week.",
    ),
    (
        "TikTok/Meta ads for the sermon note-taking app: proven creatives, hooks, and landing-flow benchmarks",
        TopicCategory::Marketing,
        "Collect examples + a 2-week testing plan.",
    ),
    (
        "OpenClaw / agent security: practical prompt-injection defenses + sandboxing patterns that hold up",
        TopicCategory::MlAi,
        "Turn into a checklist we can apply to Clawdbot.",
    ),
    (
        "Options trading: covered calls vs. cash-secured puts (rules of thumb + risk cases)",
        TopicCategory::Trading,
        "Make it practical, with \u{201c}when NOT to do it.\u{201d}",
    ),
    (
        "PM2 + nginx droplet ops: a clean, repeatable deployment pattern (repo layout, env, restarts, logs)",
        TopicCategory::WorkflowTools,
        "Codify a standard so every new subdomain is 10 minutes.",
    ),
    (
        "App Store launch checklist for indie apps (privacy, screenshots, onboarding, review gotchas)",
        TopicCategory::AppDev,
        "Specifically for the sermon app pipeline.",
    ),
    (
        "SEO for small tools: what to publish + how to build topical authority without a huge blog",
        TopicCategory::Marketing,
        "Could apply to Sparkpoint and QuizzyDots.",
    ),
    (
        "Local-first \u{201c}second brain\u{201d} architecture: what to store, naming conventions, and retrieval patterns",
        TopicCategory::WorkflowTools,
        "Improve how we file research + decisions.",
    ),
    (
        "Next.js production hardening: caching, env management, monitoring, and avoiding common outages",
        TopicCategory::AppDev,
        "Tailored to our small droplet + nginx setup.",
    ),
    (
        "AI tooling landscape: which models are best for what (quality vs cost vs speed) and how to route tasks",
        TopicCategory::MlAi,
        "Give a simple rubric for model choice.",
    ),
];

/// Builds the first-run topic set. Every topic shares `now` as its creation time.
pub fn default_topics(now: DateTime<Utc>) -> Vec<ResearchTopic> {
    DEFAULT_TOPICS
        .iter()
        .map(|(title, category, notes)| ResearchTopic {
            id: Uuid::new_v4().to_string(),
            title: (*title).to_string(),
            category: *category,
            notes: Some((*notes).to_string()),
            links: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
            last_used_at: None,
            used_count: 0,
        })
        .collect()
}
