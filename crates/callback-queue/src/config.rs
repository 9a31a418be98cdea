//! Configuration for the queue service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main queue service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

impl QueueConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Override settings from environment variables
    ///
    /// Recognized: `HOST`, `PORT`, `QUEUE_DB_PATH`, `QUEUE_MAX_ATTEMPTS`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid PORT '{}': {}", port, e)))?;
        }
        if let Ok(path) = std::env::var("QUEUE_DB_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(max) = std::env::var("QUEUE_MAX_ATTEMPTS") {
            self.retry.max_attempts = max
                .parse()
                .map_err(|e| Error::Config(format!("Invalid QUEUE_MAX_ATTEMPTS '{}': {}", max, e)))?;
        }
        Ok(())
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.processing.poll_interval_ms == 0 {
            return Err(Error::Config("processing.poll_interval_ms must be greater than 0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be greater than 0".to_string()));
        }
        if self.retry.sweep_interval_secs == Some(0) {
            return Err(Error::Config(
                "retry.sweep_interval_secs must be greater than 0 (omit it to disable the sweep)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            enable_cors: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// How long a connection waits on a locked database before giving up
    pub busy_timeout_ms: u64,
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("callback_queue.db"),
            busy_timeout_ms: 5000,
        }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Interval between queue polls when no wake-up arrives (default: 1000ms)
    pub poll_interval_ms: u64,
    /// POST a notification to each job's callback_url (default: true).
    /// When false, jobs are completed without any outbound call.
    pub deliver_callbacks: bool,
    /// Timeout for a single callback request in seconds (default: 30)
    pub callback_timeout_secs: u64,
}

impl ProcessingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            deliver_callbacks: true,
            callback_timeout_secs: 30,
        }
    }
}

/// Retry configuration for failed jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Failed jobs with fewer attempts than this are eligible for retry (default: 3)
    pub max_attempts: u32,
    /// Run the retry sweep automatically on this interval; disabled when unset
    pub sweep_interval_secs: Option<u64>,
}

impl RetryConfig {
    /// Sweep period; `None` when unset or zero
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            sweep_interval_secs: None,
        }
    }
}
