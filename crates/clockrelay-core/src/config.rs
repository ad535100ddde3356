//! ClockRelay configuration system.
//!
//! Config is resolved once at startup (file + environment overrides) and
//! threaded explicitly into components — business logic never reads the
//! environment on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared-secret verification token for inbound commands.
    /// Empty string means verification is skipped.
    #[serde(default)]
    pub verify_token: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8090
}
fn default_db_path() -> String {
    RelayConfig::home_dir()
        .join("clockrelay.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verify_token: String::new(),
            db_path: default_db_path(),
            tracker: TrackerConfig::default(),
            usage: UsageConfig::default(),
            retry: RetryConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load config from the default path (~/.clockrelay/config.toml),
    /// falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Apply environment overrides. Called once at startup; components
    /// receive the resolved values and never look at the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CLOCKRELAY_HOST") {
            self.host = v;
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_PORT") {
            if let Ok(p) = v.parse() {
                self.port = p;
            }
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_VERIFY_TOKEN") {
            self.verify_token = v;
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_DB_PATH") {
            self.db_path = v;
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_TRACKER_URL") {
            self.tracker.base_url = v;
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_TRACKER_TOKEN") {
            self.tracker.token = v;
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_USAGE_MID") {
            if let Ok(p) = v.parse() {
                self.usage.mid = p;
            }
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_USAGE_HIGH") {
            if let Ok(p) = v.parse() {
                self.usage.high = p;
            }
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_RETRY_MAX") {
            if let Ok(p) = v.parse() {
                self.retry.max_retries = p;
            }
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_RETRY_INITIAL_MS") {
            if let Ok(p) = v.parse() {
                self.retry.initial_wait_ms = p;
            }
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_RETRY_MAX_WAIT_MS") {
            if let Ok(p) = v.parse() {
                self.retry.max_wait_ms = p;
            }
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_RETRY_MULTIPLIER") {
            if let Ok(p) = v.parse() {
                self.retry.multiplier = p;
            }
        }
        if let Ok(v) = std::env::var("CLOCKRELAY_REPORT_TASK_CAP") {
            if let Ok(p) = v.parse() {
                self.report.task_cap = p;
            }
        }
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        std::env::var("CLOCKRELAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::home_dir().join("config.toml"))
    }

    /// Get the ClockRelay home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clockrelay")
    }
}

/// Upstream time-tracker API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
}

fn default_tracker_url() -> String {
    "https://api.tracker.example.com".into()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: default_tracker_url(),
            token: String::new(),
        }
    }
}

/// Usage classification cut-points (percent).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageConfig {
    #[serde(default = "default_mid")]
    pub mid: f64,
    #[serde(default = "default_high")]
    pub high: f64,
}

fn default_mid() -> f64 {
    50.0
}
fn default_high() -> f64 {
    90.0
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            mid: default_mid(),
            high: default_high(),
        }
    }
}

/// Retry policy for outbound upstream calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_wait_ms")]
    pub initial_wait_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_initial_wait_ms() -> u64 {
    1_000
}
fn default_max_wait_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_wait_ms: default_initial_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Report rendering knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Maximum number of tasks rendered per message.
    #[serde(default = "default_task_cap")]
    pub task_cap: usize,
    /// Maximum number of comments rendered per task.
    #[serde(default = "default_comment_cap")]
    pub comment_cap: usize,
    /// Maximum length of a single rendered comment.
    #[serde(default = "default_comment_len")]
    pub comment_len: usize,
}

fn default_task_cap() -> usize {
    10
}
fn default_comment_cap() -> usize {
    3
}
fn default_comment_len() -> usize {
    120
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            task_cap: default_task_cap(),
            comment_cap: default_comment_cap(),
            comment_len: default_comment_len(),
        }
    }
}
