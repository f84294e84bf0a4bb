//! Error types for mailq operations.

use thiserror::Error;

/// Result type used throughout mailq.
pub type MailQResult<T> = Result<T, MailQError>;

/// Main error type for mailq operations.
#[derive(Error, Debug)]
pub enum MailQError {
    /// The primary lane is at capacity; the producer should retry later
    #[error("Queue is full (capacity: {capacity})")]
    QueueFull {
        /// Configured lane capacity
        capacity: usize,
    },

    /// The queue has been closed and accepts no more jobs
    #[error("Queue is closed")]
    QueueClosed,

    /// A blocking dequeue was interrupted by the shutdown signal
    #[error("Operation cancelled by shutdown")]
    Cancelled,

    /// A delivery attempt failed
    #[error("Delivery failed: {message}")]
    DeliveryFailed {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A delivery attempt exceeded its deadline
    #[error("Delivery timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// An email request was rejected before being queued
    #[error("Validation failed on '{field}': {message}")]
    Validation {
        /// Offending field
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// Logging could not be initialised
    #[error("Logging error: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// I/O error, e.g. while installing a signal handler
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker pool is already running
    #[error("Worker pool is already running")]
    AlreadyRunning,

    /// The worker pool is not running
    #[error("Worker pool is not running")]
    NotRunning,

    /// Metrics registration error
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl MailQError {
    /// Create a new delivery error with an underlying cause
    pub fn delivery<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::DeliveryFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a delivery error without an underlying cause
    pub fn delivery_msg(message: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Whether a producer may reasonably retry the same call later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }

    /// HTTP status code the request layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::QueueFull { .. } | Self::QueueClosed => 503,
            Self::Validation { .. } => 422,
            _ => 500,
        }
    }
}
