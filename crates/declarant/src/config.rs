//! Runtime configuration loaded from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Root directory for the database and uploaded files.
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,

    /// Number of worker threads processing tasks.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Maximum processing attempts per task (first run + retries).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between retry attempts, in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_data_directory() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".declarant"))
        .unwrap_or_else(|| PathBuf::from(".declarant"))
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            worker_count: default_worker_count(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Config {
    /// Path of the SQLite database under the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_directory.join("data").join("declarant.db")
    }

    /// Root directory for uploaded spreadsheets.
    pub fn upload_directory(&self) -> PathBuf {
        self.data_directory.join("uploads")
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Retry policy for the worker pool.
    pub fn retry_policy(&self) -> crate::worker::RetryPolicy {
        crate::worker::RetryPolicy {
            max_attempts: self.max_attempts,
            delay: self.retry_delay(),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "workerCount must be at least 1".to_string(),
        });
    }
    if config.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "maxAttempts must be at least 1".to_string(),
        });
    }
    Ok(())
}
