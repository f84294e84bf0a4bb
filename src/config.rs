//! Configuration types for mailq.
//!
//! This module contains the configuration structures used throughout mailq:
//! queue sizing and retry policy, worker pool settings, and logging.
//! All values are fixed once the queue and pool are constructed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for mailq.
///
/// # Examples
///
/// ```rust
/// use mailq::config::{MailQConfig, QueueConfig, WorkerConfig};
///
/// // Use default configuration
/// let config = MailQConfig::default();
///
/// // Custom configuration
/// let config = MailQConfig {
///     workers: WorkerConfig {
///         num_workers: 8,
///         ..Default::default()
///     },
///     queue: QueueConfig {
///         capacity: 10_000,
///         max_retries: 5,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailQConfig {
    /// Queue and retry configuration
    pub queue: QueueConfig,

    /// Worker pool configuration
    pub workers: WorkerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Queue and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Capacity of each lane (primary and retry)
    pub capacity: usize,

    /// A job is dead-lettered once this many attempts have failed
    pub max_retries: u32,

    /// Retry delay unit; the n-th retry waits n units (in milliseconds)
    pub retry_base_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            max_retries: 3,
            retry_base_delay_ms: 1000, // 1 second
        }
    }
}

impl QueueConfig {
    /// Set the lane capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry delay unit.
    pub fn with_retry_base_delay(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }

    /// Retry delay unit as a `Duration`.
    pub fn retry_base_delay(&self) -> Duration {
        self.retry_base_delay_ms.millis()
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of workers to spawn
    pub num_workers: usize,

    /// Deadline for a single delivery attempt (in milliseconds)
    pub attempt_timeout_ms: u64,

    /// Time to wait for each worker to stop gracefully (in seconds)
    pub shutdown_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: 3,
            attempt_timeout_ms: 5000,  // 5 seconds
            shutdown_timeout_secs: 30, // 30 seconds
        }
    }
}

impl WorkerConfig {
    /// Create a new worker configuration with a specific number of workers.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Set the per-attempt deadline.
    pub fn with_attempt_timeout(mut self, timeout_ms: u64) -> Self {
        self.attempt_timeout_ms = timeout_ms;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_timeout(mut self, timeout_secs: u64) -> Self {
        self.shutdown_timeout_secs = timeout_secs;
        self
    }

    /// Per-attempt deadline as a `Duration`.
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout_ms.millis()
    }

    /// Shutdown grace period as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout_secs.secs()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, used when `RUST_LOG` is not set
    pub level: LogLevel,

    /// Enable structured JSON logging
    pub json_format: bool,

    /// Include target module in logs
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: true,
            include_targets: false,
        }
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Helper trait for converting durations in configuration.
pub trait DurationExt {
    /// Convert seconds to Duration
    fn secs(self) -> Duration;
    /// Convert milliseconds to Duration
    fn millis(self) -> Duration;
}

impl DurationExt for u64 {
    fn secs(self) -> Duration {
        Duration::from_secs(self)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self)
    }
}

impl MailQConfig {
    /// Create a new configuration optimized for development.
    pub fn development() -> Self {
        Self {
            queue: QueueConfig {
                capacity: 100,
                max_retries: 2,
                retry_base_delay_ms: 200,
            },
            workers: WorkerConfig {
                num_workers: 2,
                attempt_timeout_ms: 2000,
                shutdown_timeout_secs: 5,
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                json_format: false,
                include_targets: true,
            },
        }
    }

    /// Create a new configuration optimized for production.
    pub fn production() -> Self {
        Self {
            queue: QueueConfig {
                capacity: 10_000,
                max_retries: 5,
                ..Default::default()
            },
            workers: WorkerConfig {
                num_workers: num_cpus::get().max(1) * 2,
                attempt_timeout_ms: 10_000,
                shutdown_timeout_secs: 60,
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Create a configuration for testing.
    pub fn testing() -> Self {
        Self {
            queue: QueueConfig {
                capacity: 16,
                max_retries: 2,
                retry_base_delay_ms: 10,
            },
            workers: WorkerConfig {
                num_workers: 1,
                attempt_timeout_ms: 200,
                shutdown_timeout_secs: 2,
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                json_format: false,
                include_targets: true,
            },
        }
    }

    /// Build a configuration from environment variables.
    ///
    /// Missing or unparsable variables keep their default value.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            default: T,
        ) -> T {
            lookup(key)
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        Self {
            queue: QueueConfig {
                capacity: parsed(&lookup, "QUEUE_SIZE", defaults.queue.capacity),
                max_retries: parsed(&lookup, "MAX_RETRIES", defaults.queue.max_retries),
                retry_base_delay_ms: parsed(
                    &lookup,
                    "RETRY_BASE_DELAY_MS",
                    defaults.queue.retry_base_delay_ms,
                ),
            },
            workers: WorkerConfig {
                num_workers: parsed(&lookup, "WORKER_COUNT", defaults.workers.num_workers),
                attempt_timeout_ms: parsed(
                    &lookup,
                    "ATTEMPT_TIMEOUT_MS",
                    defaults.workers.attempt_timeout_ms,
                ),
                shutdown_timeout_secs: parsed(
                    &lookup,
                    "SHUTDOWN_TIMEOUT_SECS",
                    defaults.workers.shutdown_timeout_secs,
                ),
            },
            logging: LoggingConfig {
                level: lookup("LOG_LEVEL")
                    .and_then(|raw| LogLevel::parse(&raw))
                    .unwrap_or(defaults.logging.level),
                json_format: parsed(&lookup, "LOG_JSON", defaults.logging.json_format),
                include_targets: defaults.logging.include_targets,
            },
        }
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Validate queue config
        if self.queue.capacity == 0 {
            errors.push("Queue capacity must be greater than 0".to_string());
        }

        if self.queue.max_retries == 0 {
            errors.push("Max retries must be greater than 0".to_string());
        }

        if self.queue.retry_base_delay_ms == 0 {
            errors.push("Retry base delay must be greater than 0".to_string());
        }

        // Validate worker config
        if self.workers.num_workers == 0 {
            errors.push("Number of workers must be greater than 0".to_string());
        }

        if self.workers.num_workers > 1000 {
            errors.push("Number of workers should not exceed 1000".to_string());
        }

        if self.workers.attempt_timeout_ms == 0 {
            errors.push("Attempt timeout must be greater than 0".to_string());
        }

        if self.workers.attempt_timeout() >= self.workers.shutdown_timeout() {
            errors.push("Attempt timeout must be shorter than the shutdown timeout".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
