//! Job queue for mailq.
//!
//! The queue is the only state shared between producers and workers:
//! - **Primary lane**: bounded, receives new jobs from producers
//! - **Retry lane**: bounded, receives failed jobs after their backoff delay
//! - **Dead-letter store**: unbounded, holds jobs that exhausted their retries
//!
//! # Examples
//!
//! ```rust
//! use mailq::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> MailQResult<()> {
//! let queue = JobQueue::new(&QueueConfig::default().with_capacity(1));
//!
//! queue.enqueue(EmailJob::new("a@example.com", "Hi", "Hello"))?;
//! let full = queue.enqueue(EmailJob::new("b@example.com", "Hi", "Hello"));
//! assert!(matches!(full, Err(MailQError::QueueFull { .. })));
//!
//! let job = queue.dequeue(&ShutdownSignal::new()).await?;
//! assert_eq!(job.to, "a@example.com");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod memory;
pub mod retry;

pub use memory::JobQueue;
pub use retry::{RetryDecision, RetryPolicy};

/// Point-in-time statistics about the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs waiting in the primary lane
    pub queue_length: usize,
    /// Jobs waiting in the retry lane
    pub retry_queue_length: usize,
    /// Jobs in the dead-letter store
    pub dead_letter_count: usize,
    /// Whether the queue has been closed
    pub is_closed: bool,
    /// Jobs ever accepted into the primary lane
    pub total_enqueued: u64,
}
