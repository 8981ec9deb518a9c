use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const TOPICS_PATH_ENV: &str = "RESEARCH_TOPICS_PATH";
pub const DATA_DIR_ENV: &str = "RUSTY_DATA_DIR";
pub const DB_PATH_ENV: &str = "RUSTY_DB_PATH";
pub const LOG_DIR_ENV: &str = "RUSTY_LOG_DIR";
pub const BIND_ADDR_ENV: &str = "RUSTY_BIND_ADDR";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Runtime settings resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub topics_path: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("unable to determine working directory")?;
        Self::resolve(&cwd, |key| std::env::var(key).ok())
    }

    /// Resolves settings from `lookup`, with relative defaults anchored at `base_dir`.
    pub fn resolve(base_dir: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = read(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join(".data"));
        let topics_path = read(TOPICS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("research-topics.json"));
        let db_path = read(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("rusty.sqlite"));
        let log_dir = read(LOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("logs"));

        let raw_addr = read(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid {BIND_ADDR_ENV} value '{raw_addr}'"))?;

        Ok(Self {
            data_dir,
            topics_path,
            db_path,
            log_dir,
            bind_addr,
        })
    }
}
