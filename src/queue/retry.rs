//! Retry policy: linear backoff with a hard attempt budget.

use crate::config::QueueConfig;
use std::time::Duration;

/// What to do with a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-insert into the retry lane once `delay` has elapsed
    Requeue {
        /// Backoff before re-insertion
        delay: Duration,
    },
    /// Retry budget exhausted; move to the dead-letter store
    DeadLetter,
}

/// Maps a job's failure count to a [`RetryDecision`].
///
/// The n-th failure waits `n * base_delay`. A job whose failure count has
/// reached `max_retries` is dead-lettered instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff unit.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decide for a job that has now failed `retry_count` times.
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retries {
            RetryDecision::DeadLetter
        } else {
            RetryDecision::Requeue {
                delay: self.base_delay.saturating_mul(retry_count),
            }
        }
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }
}
