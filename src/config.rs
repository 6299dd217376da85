//! Runtime configuration
//!
//! Everything is read from environment variables so the server can be
//! configured from an MCP client's launch entry.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_FOOD_FACTS_URL: &str = "https://world.openfoodfacts.net";
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_VISION_MODEL: &str = "claude-haiku-4-5";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Service configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub database_path: PathBuf,
    pub food_facts_url: String,
    pub anthropic_url: String,
    pub vision_model: String,
    pub http_timeout_secs: u64,
    /// Never serialized; only its presence is reported
    #[serde(skip)]
    pub anthropic_api_key: Option<String>,
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_timeout_secs = non_empty("NUTRISCAN_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Self {
            database_path: non_empty("NUTRISCAN_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            food_facts_url: non_empty("NUTRISCAN_FOOD_FACTS_URL")
                .unwrap_or_else(|| DEFAULT_FOOD_FACTS_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            anthropic_url: non_empty("NUTRISCAN_ANTHROPIC_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            vision_model: non_empty("NUTRISCAN_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            http_timeout_secs,
            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn has_vision_key(&self) -> bool {
        self.anthropic_api_key.is_some()
    }
}

/// `<project>/data/nutriscan.db`, resolved from the executable location
fn default_database_path() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(parent) = path.parent() {
            if let Some(grandparent) = parent.parent() {
                path = grandparent.to_path_buf();
            }
        }
    }

    path.push("data");
    path.push("nutriscan.db");
    path
}
