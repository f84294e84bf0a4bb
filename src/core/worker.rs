//! Worker implementation for mailq.
//!
//! Each worker loops: wait for a job, hand it to the [`Mailer`] under a
//! deadline, then report the outcome back to the queue. A failed or timed
//! out attempt goes through [`JobQueue::schedule_retry`]; it never stops the
//! worker.
//!
//! The shutdown signal does not interrupt work. Once it fires, workers keep
//! taking jobs until both lanes are empty and only then exit.

use crate::config::WorkerConfig;
use crate::delivery::Mailer;
use crate::error::{MailQError, MailQResult};
use crate::job::EmailJob;
use crate::queue::JobQueue;
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Lifecycle state of a single worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not started yet, or waiting for a job
    Idle,
    /// A delivery attempt is in flight
    Dispatching,
    /// Loop exited; terminal
    Stopped,
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The mailer reported success
    Delivered,
    /// The mailer reported an error, or panicked
    Failed(String),
    /// The attempt ran past its deadline
    TimedOut,
}

/// Statistics about worker activity
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Number of worker loops currently running
    pub active_workers: usize,
    /// Total number of workers spawned
    pub total_workers: usize,
    /// Attempts the mailer reported as delivered
    pub deliveries_succeeded: u64,
    /// Attempts that returned an error
    pub deliveries_failed: u64,
    /// Attempts that hit the deadline
    pub deliveries_timed_out: u64,
    /// State of each worker, indexed by `worker_id - 1`
    pub worker_states: Vec<WorkerState>,
}

/// Individual worker that delivers jobs
pub struct Worker {
    id: usize,
    queue: JobQueue,
    mailer: Arc<dyn Mailer>,
    attempt_timeout: Duration,
    shutdown: ShutdownSignal,
    stats: Arc<Mutex<WorkerStats>>,
}

impl Worker {
    /// Create a new worker with the given ID
    pub fn new(
        id: usize,
        queue: JobQueue,
        mailer: Arc<dyn Mailer>,
        attempt_timeout: Duration,
        shutdown: ShutdownSignal,
        stats: Arc<Mutex<WorkerStats>>,
    ) -> Self {
        Self {
            id,
            queue,
            mailer,
            attempt_timeout,
            shutdown,
            stats,
        }
    }

    /// Run the worker loop until the shutdown signal has fired and both
    /// lanes are empty.
    pub async fn run(&self) -> WorkerState {
        tracing::info!(worker_id = self.id, "Worker started");

        loop {
            match self.queue.dequeue(&self.shutdown).await {
                Ok(job) => {
                    self.set_state(WorkerState::Dispatching).await;
                    self.process_job(job).await;
                    self.set_state(WorkerState::Idle).await;
                }
                Err(MailQError::Cancelled) => break,
                Err(e) => {
                    tracing::error!(worker_id = self.id, error = %e, "Failed to dequeue job");
                }
            }
        }

        tracing::info!(worker_id = self.id, "Worker stopping");
        self.set_state(WorkerState::Stopped).await;
        WorkerState::Stopped
    }

    /// Attempt delivery once and route the outcome back to the queue.
    async fn process_job(&self, job: EmailJob) -> AttemptOutcome {
        tracing::info!(
            worker_id = self.id,
            job_id = %job.id,
            to = %job.to,
            retry = job.retry_count,
            "Processing job"
        );

        let outcome = self.attempt(&job).await;
        self.update_stats(&outcome).await;

        match &outcome {
            AttemptOutcome::Delivered => self.queue.mark_success(&job),
            AttemptOutcome::Failed(error) => {
                tracing::error!(
                    worker_id = self.id,
                    job_id = %job.id,
                    error = %error,
                    "Failed to send email"
                );
                self.queue.schedule_retry(job);
            }
            AttemptOutcome::TimedOut => {
                tracing::error!(
                    worker_id = self.id,
                    job_id = %job.id,
                    timeout_ms = self.attempt_timeout.as_millis() as u64,
                    "Email delivery timed out"
                );
                self.queue.schedule_retry(job);
            }
        }

        outcome
    }

    /// Run the mailer on its own task so a panic or an overrun cannot take
    /// the worker down with it.
    async fn attempt(&self, job: &EmailJob) -> AttemptOutcome {
        let mailer = Arc::clone(&self.mailer);
        let payload = job.clone();
        let mut handle = tokio::spawn(async move { mailer.deliver(&payload).await });

        match timeout(self.attempt_timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => AttemptOutcome::Delivered,
            Ok(Ok(Err(error))) => AttemptOutcome::Failed(error.to_string()),
            Ok(Err(join_error)) => AttemptOutcome::Failed(format!("delivery panicked: {join_error}")),
            Err(_) => {
                handle.abort();
                AttemptOutcome::TimedOut
            }
        }
    }

    async fn set_state(&self, state: WorkerState) {
        let mut stats = self.stats.lock().await;
        let slot = self
            .id
            .checked_sub(1)
            .and_then(|index| stats.worker_states.get_mut(index));
        if let Some(slot) = slot {
            *slot = state;
        }
    }

    /// Update worker statistics
    async fn update_stats(&self, outcome: &AttemptOutcome) {
        let mut stats = self.stats.lock().await;

        match outcome {
            AttemptOutcome::Delivered => stats.deliveries_succeeded += 1,
            AttemptOutcome::Failed(_) => stats.deliveries_failed += 1,
            AttemptOutcome::TimedOut => stats.deliveries_timed_out += 1,
        }
    }
}

/// Fixed-size pool of workers sharing one queue and one shutdown signal.
///
/// A pool is single-use: once stopped, even before it was ever started, it
/// cannot be started again.
pub struct WorkerPool {
    queue: JobQueue,
    mailer: Arc<dyn Mailer>,
    config: WorkerConfig,
    shutdown: ShutdownSignal,
    started: AtomicBool,
    /// Number of currently active workers
    active_workers: Arc<AtomicUsize>,
    /// Handles to all worker tasks
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Worker statistics
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerPool {
    /// Create a pool; no worker runs until [`start`](Self::start).
    pub fn new(config: WorkerConfig, queue: JobQueue, mailer: Arc<dyn Mailer>) -> Self {
        let stats = WorkerStats {
            worker_states: vec![WorkerState::Idle; config.num_workers],
            ..Default::default()
        };

        Self {
            queue,
            mailer,
            config,
            shutdown: ShutdownSignal::new(),
            started: AtomicBool::new(false),
            active_workers: Arc::new(AtomicUsize::new(0)),
            worker_handles: Mutex::new(Vec::new()),
            stats: Arc::new(Mutex::new(stats)),
        }
    }

    /// Spawn `num_workers` workers.
    pub async fn start(&self) -> MailQResult<()> {
        if self.shutdown.is_triggered() || self.started.swap(true, Ordering::SeqCst) {
            return Err(MailQError::AlreadyRunning);
        }

        tracing::info!(worker_count = self.config.num_workers, "Starting worker pool");

        let mut handles = self.worker_handles.lock().await;
        for worker_id in 1..=self.config.num_workers {
            handles.push(self.spawn_worker(worker_id).await);
        }

        Ok(())
    }

    async fn spawn_worker(&self, worker_id: usize) -> JoinHandle<()> {
        let active_workers = Arc::clone(&self.active_workers);
        let stats = Arc::clone(&self.stats);
        let worker = Worker::new(
            worker_id,
            self.queue.clone(),
            Arc::clone(&self.mailer),
            self.config.attempt_timeout(),
            self.shutdown.clone(),
            Arc::clone(&self.stats),
        );

        // Update total workers count
        {
            let mut stats_guard = stats.lock().await;
            stats_guard.total_workers += 1;
        }

        let handle = tokio::spawn(async move {
            active_workers.fetch_add(1, Ordering::SeqCst);
            {
                let mut stats_guard = stats.lock().await;
                stats_guard.active_workers = active_workers.load(Ordering::SeqCst);
            }

            worker.run().await;

            active_workers.fetch_sub(1, Ordering::SeqCst);
            {
                let mut stats_guard = stats.lock().await;
                stats_guard.active_workers = active_workers.load(Ordering::SeqCst);
            }
        });

        tracing::debug!(worker_id, "Spawned worker");
        handle
    }

    /// Signal every worker to stop and wait for them to exit.
    ///
    /// Workers first drain whatever is left in both lanes, so the queue
    /// should be closed to producers beforehand. A worker that has not
    /// exited within the shutdown timeout is aborted. If the queue is closed,
    /// jobs still waiting after that are discarded and reported through
    /// [`JobQueue::discard_remaining`]. Calling this a second time does
    /// nothing.
    pub async fn stop(&self) -> MailQResult<()> {
        self.shutdown.trigger();

        let handles = {
            let mut guard = self.worker_handles.lock().await;
            std::mem::take(&mut *guard)
        };

        if handles.is_empty() {
            return Ok(());
        }

        tracing::info!("Stopping worker pool");

        let grace = self.config.shutdown_timeout();
        let stats = Arc::clone(&self.stats);
        let active_workers = Arc::clone(&self.active_workers);
        futures::future::join_all(handles.into_iter().enumerate().map(|(index, mut handle)| {
            let stats = Arc::clone(&stats);
            let active_workers = Arc::clone(&active_workers);
            async move {
                match timeout(grace, &mut handle).await {
                    Ok(Ok(())) => {
                        tracing::debug!(worker_id = index + 1, "Worker shut down cleanly");
                    }
                    Ok(Err(e)) => {
                        tracing::error!(worker_id = index + 1, error = %e, "Worker task failed");
                    }
                    Err(_) => {
                        tracing::warn!(
                            worker_id = index + 1,
                            "Worker did not stop within the shutdown timeout, aborting"
                        );
                        handle.abort();
                        // Wait until the task is gone so it cannot take another job.
                        if handle.await.is_ok() {
                            // Exited on its own before the abort landed
                            return;
                        }
                        let _ = active_workers.fetch_update(
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                            |count| count.checked_sub(1),
                        );
                        let mut stats = stats.lock().await;
                        stats.active_workers = active_workers.load(Ordering::SeqCst);
                        if let Some(slot) = stats.worker_states.get_mut(index) {
                            *slot = WorkerState::Stopped;
                        }
                    }
                }
            }
        }))
        .await;

        if self.queue.is_closed() {
            let discarded = self.queue.discard_remaining();
            if discarded > 0 {
                tracing::warn!(discarded, "Jobs left undelivered at shutdown");
            }
        }

        tracing::info!("Worker pool stopped");
        Ok(())
    }

    /// Whether the pool has been started and not yet told to stop.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.is_triggered()
    }

    /// Get the number of active workers
    pub fn active_worker_count(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Get current worker statistics
    pub async fn stats(&self) -> WorkerStats {
        self.stats.lock().await.clone()
    }
}
