//! The mailq service facade.
//!
//! [`MailQ`] owns the job queue and the worker pool and enforces the
//! shutdown order: close the queue to producers first, then stop the pool.

use crate::config::MailQConfig;
use crate::delivery::Mailer;
use crate::error::{MailQError, MailQResult};
use crate::job::{EmailJob, EmailRequest};
use crate::observer::{SharedObserver, noop};
use crate::queue::{JobQueue, QueueStats};
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod worker;

pub use worker::{AttemptOutcome, Worker, WorkerPool, WorkerState, WorkerStats};

/// The main mailq service.
///
/// This is the surface the request layer talks to: submit jobs, read
/// statistics, inspect dead letters, and drive the lifecycle.
///
/// # Examples
///
/// ```rust
/// use mailq::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> MailQResult<()> {
///     let mailer = Arc::new(SimulatedMailer::reliable(Duration::from_millis(5)));
///     let mailq = MailQ::new(MailQConfig::testing(), mailer)?;
///     mailq.start().await?;
///
///     let job = mailq.submit(EmailRequest {
///         to: "user@example.com".to_string(),
///         subject: "Welcome".to_string(),
///         body: "Thanks for signing up".to_string(),
///     })?;
///     println!("Job queued: {}", job.id);
///
///     mailq.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct MailQ {
    queue: JobQueue,
    pool: WorkerPool,
    config: MailQConfig,
    is_running: RwLock<bool>,
}

impl MailQ {
    /// Create a new service with the given configuration.
    pub fn new(config: MailQConfig, mailer: Arc<dyn Mailer>) -> MailQResult<Self> {
        Self::with_observer(config, mailer, noop())
    }

    /// Create a new service that reports queue transitions to `observer`.
    pub fn with_observer(
        config: MailQConfig,
        mailer: Arc<dyn Mailer>,
        observer: SharedObserver,
    ) -> MailQResult<Self> {
        config
            .validate()
            .map_err(|errors| MailQError::config(errors.join("; ")))?;

        let queue = JobQueue::with_observer(&config.queue, observer);
        let pool = WorkerPool::new(config.workers.clone(), queue.clone(), mailer);

        tracing::info!(
            worker_count = config.workers.num_workers,
            queue_size = config.queue.capacity,
            max_retries = config.queue.max_retries,
            "Email queue service configured"
        );

        Ok(Self {
            queue,
            pool,
            config,
            is_running: RwLock::new(false),
        })
    }

    /// Start the worker pool.
    pub async fn start(&self) -> MailQResult<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(MailQError::AlreadyRunning);
        }

        self.pool.start().await?;
        *is_running = true;
        Ok(())
    }

    /// Close the queue to producers, then stop the pool and wait for it.
    ///
    /// Jobs accepted before the close are still delivered while workers
    /// drain the lanes, within the configured shutdown timeout. Retries
    /// already waiting on their backoff timer may still fire after this
    /// returns; they find the queue closed and are dropped.
    pub async fn shutdown(&self) -> MailQResult<()> {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return Err(MailQError::NotRunning);
        }

        tracing::info!("Shutting down gracefully...");
        self.queue.close();
        self.pool.stop().await?;

        *is_running = false;
        tracing::info!("Service stopped");
        Ok(())
    }

    /// Wait for Ctrl+C, then shut down gracefully.
    pub async fn wait_for_shutdown(&self) -> MailQResult<()> {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        self.shutdown().await
    }

    /// Validate a request and queue it as a new job.
    pub fn submit(&self, request: EmailRequest) -> MailQResult<EmailJob> {
        let job = request.into_job()?;
        self.queue.enqueue(job.clone())?;
        Ok(job)
    }

    /// Queue an already-built job.
    pub fn enqueue(&self, job: EmailJob) -> MailQResult<()> {
        self.queue.enqueue(job)
    }

    /// Get queue statistics.
    pub fn stats(&self) -> QueueStats {
        self.queue.get_stats()
    }

    /// Get worker statistics.
    pub async fn worker_stats(&self) -> WorkerStats {
        self.pool.stats().await
    }

    /// Jobs that exhausted their retries.
    pub fn dead_letter_jobs(&self) -> Vec<EmailJob> {
        self.queue.get_dead_letter_jobs()
    }

    /// Check if the service is currently running.
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// The underlying queue.
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Get the configuration used by this service.
    pub fn config(&self) -> &MailQConfig {
        &self.config
    }
}
