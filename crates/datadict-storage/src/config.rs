//! Configuration for log access.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for writing and reading logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How long a reader or flush waits for the access lock before giving up.
    pub file_timeout: Duration,

    /// First wait between access lock attempts; doubles after every attempt.
    pub retry_delay: Duration,

    /// Upper bound for the wait between attempts.
    pub max_retry_delay: Duration,

    /// Records per chunk along the record dimension.
    pub chunk_records: usize,

    /// `strftime` format of the human readable timestamps.
    pub time_format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(200),
            chunk_records: 1024,
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DDZ_FILE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<f64>() {
                if secs.is_finite() && secs >= 0.0 {
                    config.file_timeout = Duration::from_secs_f64(secs);
                }
            }
        }

        if let Ok(val) = std::env::var("DDZ_RETRY_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                config.retry_delay = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("DDZ_MAX_RETRY_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                config.max_retry_delay = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("DDZ_CHUNK_RECORDS") {
            if let Ok(n) = val.parse() {
                config.chunk_records = n;
            }
        }

        if let Ok(val) = std::env::var("DDZ_TIME_FORMAT") {
            config.time_format = val;
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_records == 0 {
            return Err("chunk_records must be > 0".to_string());
        }

        if self.retry_delay.is_zero() {
            return Err("retry_delay must be > 0".to_string());
        }

        if self.max_retry_delay < self.retry_delay {
            return Err("max_retry_delay must be >= retry_delay".to_string());
        }

        if self.time_format.is_empty() {
            return Err("time_format must not be empty".to_string());
        }

        Ok(())
    }

    /// Same configuration with a different access timeout.
    pub fn with_file_timeout(mut self, timeout: Duration) -> Self {
        self.file_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.file_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values() {
        let config = StorageConfig {
            chunk_records: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StorageConfig {
            max_retry_delay: Duration::from_millis(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("DDZ_CHUNK_RECORDS", "64");
        std::env::set_var("DDZ_FILE_TIMEOUT_SECS", "1.5");
        let config = StorageConfig::from_env();
        std::env::remove_var("DDZ_CHUNK_RECORDS");
        std::env::remove_var("DDZ_FILE_TIMEOUT_SECS");

        assert_eq!(config.chunk_records, 64);
        assert_eq!(config.file_timeout, Duration::from_millis(1500));
    }
}
