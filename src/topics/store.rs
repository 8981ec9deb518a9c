use crate::errors::{AppError, AppResult};
use crate::models::ResearchTopic;
use crate::topics::seed;
use chrono::Utc;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Whole-document JSON store for research topics.
///
/// Every save rewrites the full array. Writes land in a uniquely named sibling
/// file which is synced and then renamed over the destination, so readers only
/// ever observe a complete document. There is no locking between writers: the
/// last save wins.
#[derive(Debug, Clone)]
pub struct TopicStore {
    path: PathBuf,
}

impl TopicStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Startup step that writes the seed set when the file is missing or holds no array.
    pub fn ensure_initialized(&self) -> AppResult<usize> {
        let topics = self.load()?;
        Ok(topics.len())
    }

    /// Reads the persisted topics, seeding the file first if it holds no JSON array.
    ///
    /// An existing array is never replaced. A record in it that cannot be decoded
    /// fails the load and leaves the file untouched.
    pub fn load(&self) -> AppResult<Vec<ResearchTopic>> {
        self.ensure_parent_dir()?;

        if let Some(topics) = self.read_existing()? {
            return Ok(topics);
        }

        let seeded = seed::default_topics(Utc::now());
        self.save(&seeded)?;
        tracing::info!(
            path = %self.path.display(),
            count = seeded.len(),
            "seeded research topics"
        );
        Ok(seeded)
    }

    pub fn save(&self, topics: &[ResearchTopic]) -> AppResult<()> {
        self.ensure_parent_dir()?;
        let bytes = serde_json::to_vec_pretty(topics)?;
        write_atomic(&self.path, &bytes)
    }

    fn read_existing(&self) -> AppResult<Option<Vec<ResearchTopic>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                tracing::warn!(path = %self.path.display(), error = %error, "topic file unreadable");
                return Ok(None);
            }
        };

        let records = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Array(records)) => records,
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "topic file is not an array");
                return Ok(None);
            }
            Err(error) => {
                tracing::warn!(path = %self.path.display(), error = %error, "topic file is not valid JSON");
                return Ok(None);
            }
        };

        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                serde_json::from_value::<ResearchTopic>(record).map_err(|error| {
                    tracing::error!(
                        path = %self.path.display(),
                        index,
                        error = %error,
                        "undecodable topic record"
                    );
                    AppError::Io(format!(
                        "topic record {index} in {} is invalid: {error}",
                        self.path.display()
                    ))
                })
            })
            .collect::<AppResult<Vec<_>>>()
            .map(Some)
    }

    fn ensure_parent_dir(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| AppError::Io(error.to_string()))?;
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let tmp_path = temp_sibling(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(error) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(AppError::Io(format!("failed to write {}: {error}", path.display())));
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_else(|| "topics.json".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}
