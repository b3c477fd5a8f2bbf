//! Application configuration structures.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Feed source settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Downstream job-board API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Poll cadence
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Change detection rules
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Dispatch retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Pending-change outbox
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// Sync state persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Drop guard (circuit breaker)
    #[serde(default)]
    pub guard: GuardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or the defaults if the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("No config at {}, using defaults.", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.feed.url)
            .map_err(|e| AppError::validation(format!("feed.url is invalid: {e}")))?;
        let api = url::Url::parse(&self.api.base_url)
            .map_err(|e| AppError::validation(format!("api.base_url is invalid: {e}")))?;
        if api.cannot_be_a_base() {
            return Err(AppError::validation("api.base_url cannot be a base URL"));
        }
        if self.schedule.cron.trim().is_empty() {
            return Err(AppError::validation("schedule.cron is empty"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.outbox.enabled && self.outbox.max_pending == 0 {
            return Err(AppError::validation("outbox.max_pending must be > 0"));
        }
        if self.outbox.enabled && self.outbox.max_cycles == 0 {
            return Err(AppError::validation("outbox.max_cycles must be > 0"));
        }
        if self.storage.persist && self.storage.state_file.trim().is_empty() {
            return Err(AppError::validation("storage.state_file is empty"));
        }
        if self.guard.max_drop_percent > 100 {
            return Err(AppError::validation(
                "guard.max_drop_percent must be <= 100",
            ));
        }
        Ok(())
    }
}

/// Feed source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// URL of the XML job feed
    #[serde(default = "defaults::feed_url")]
    pub url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: defaults::feed_url(),
        }
    }
}

/// Downstream job-board API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; `/jobs` and `/jobs/{id}` are resolved below it
    #[serde(default = "defaults::api_base_url")]
    pub base_url: String,

    /// Optional bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Treat non-2xx responses as failed dispatches
    #[serde(default = "defaults::enabled")]
    pub check_status: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::api_base_url(),
            token: None,
            check_status: true,
        }
    }
}

/// Poll cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression (five-field, or six/seven-field with seconds)
    #[serde(default = "defaults::cron")]
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: defaults::cron(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Change detection rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Extra record fields that trigger an update besides `status`
    #[serde(default)]
    pub compare_fields: Vec<String>,
}

/// Dispatch retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per event, including the first one
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound for the backoff delay in milliseconds
    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            max_delay_ms: defaults::max_delay(),
        }
    }
}

/// Pending-change outbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    /// Keep failed events and retry them next cycle
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Maximum number of pending events kept; oldest are dropped first
    #[serde(default = "defaults::max_pending")]
    pub max_pending: usize,

    /// Cycles a failing change is retried before it is dropped
    #[serde(default = "defaults::max_cycles")]
    pub max_cycles: u32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_pending: defaults::max_pending(),
            max_cycles: defaults::max_cycles(),
        }
    }
}

/// Sync state persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persist the snapshot and outbox between restarts
    #[serde(default)]
    pub persist: bool,

    /// State file name, relative to the storage directory
    #[serde(default = "defaults::state_file")]
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: false,
            state_file: defaults::state_file(),
        }
    }
}

/// Drop guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Abort cycles whose job count collapses
    #[serde(default)]
    pub enabled: bool,

    /// Maximum allowed drop percentage (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Snapshot size below which the percentage check is skipped
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

mod defaults {
    pub fn enabled() -> bool {
        true
    }

    // Endpoints
    pub fn feed_url() -> String {
        "https://example.com/jobs.xml".into()
    }
    pub fn api_base_url() -> String {
        "https://api.jobboard.com".into()
    }
    pub fn cron() -> String {
        "0 * * * *".into()
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; jobsync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        1_000
    }
    pub fn max_delay() -> u64 {
        30_000
    }
    pub fn max_pending() -> usize {
        10_000
    }
    pub fn max_cycles() -> u32 {
        24
    }

    pub fn state_file() -> String {
        "state.json".into()
    }

    // Guard defaults
    pub fn max_drop_percent() -> u8 {
        20
    }
    pub fn min_baseline() -> usize {
        10
    }
}
