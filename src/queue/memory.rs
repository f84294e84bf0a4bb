//! In-memory job queue for mailq.
//!
//! Jobs live in two bounded lanes: the primary lane receives new jobs from
//! producers, the retry lane receives jobs coming back from a backoff delay.
//! Jobs that exhaust their retry budget are moved to an append-only
//! dead-letter store. Nothing survives a restart.
//!
//! # Locking
//!
//! - `lanes` is held only to push or pop a single job.
//! - `state` guards the closed flag together with the dead-letter store.
//!   Inserts hold it shared for the duration of the insert, `close` takes it
//!   exclusively, so no insert can straddle the moment the queue closes.
//! - Observer hooks run only after both guards are released.

use super::QueueStats;
use super::retry::{RetryDecision, RetryPolicy};
use crate::config::QueueConfig;
use crate::error::{MailQError, MailQResult};
use crate::job::EmailJob;
use crate::observer::{Lane, SharedObserver, noop};
use crate::shutdown::ShutdownSignal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Notify;

/// Bounded two-lane job queue with a dead-letter store.
///
/// Cloning is cheap and every clone refers to the same queue.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    /// Primary and retry lanes
    lanes: Mutex<Lanes>,
    /// Closed flag and dead-letter store
    state: RwLock<QueueState>,
    /// Wakes consumers blocked in `dequeue`
    available: Notify,
    /// Lane capacity
    capacity: usize,
    /// Retry policy
    policy: RetryPolicy,
    /// Jobs ever accepted into the primary lane
    total_enqueued: AtomicU64,
    /// Side-channel observer
    observer: SharedObserver,
}

#[derive(Default)]
struct Lanes {
    primary: VecDeque<EmailJob>,
    retry: VecDeque<EmailJob>,
}

impl Lanes {
    /// Retry lane first: its jobs are already overdue.
    fn pop(&mut self) -> Option<(EmailJob, Lane)> {
        if let Some(job) = self.retry.pop_front() {
            return Some((job, Lane::Retry));
        }
        self.primary.pop_front().map(|job| (job, Lane::Primary))
    }

    fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.retry.is_empty()
    }
}

#[derive(Default)]
struct QueueState {
    closed: bool,
    dead_letter: Vec<EmailJob>,
}

impl JobQueue {
    /// Create a queue with a no-op observer.
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_observer(config, noop())
    }

    /// Create a queue reporting transitions to `observer`.
    pub fn with_observer(config: &QueueConfig, observer: SharedObserver) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                lanes: Mutex::new(Lanes {
                    primary: VecDeque::with_capacity(config.capacity),
                    retry: VecDeque::with_capacity(config.capacity),
                }),
                state: RwLock::new(QueueState::default()),
                available: Notify::new(),
                capacity: config.capacity,
                policy: RetryPolicy::from(config),
                total_enqueued: AtomicU64::new(0),
                observer,
            }),
        }
    }

    /// Lane capacity.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Retry policy applied by [`schedule_retry`](Self::schedule_retry).
    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Add a new job to the primary lane without waiting.
    ///
    /// Fails with [`MailQError::QueueClosed`] once the queue is closed, and
    /// with [`MailQError::QueueFull`] when the primary lane is at capacity.
    pub fn enqueue(&self, job: EmailJob) -> MailQResult<()> {
        let state = self.inner.read_state();
        if state.closed {
            return Err(MailQError::QueueClosed);
        }

        {
            let mut lanes = self.inner.lock_lanes();
            if lanes.primary.len() >= self.inner.capacity {
                return Err(MailQError::QueueFull {
                    capacity: self.inner.capacity,
                });
            }
            lanes.primary.push_back(job.clone());
        }
        drop(state);

        self.inner.total_enqueued.fetch_add(1, Ordering::Relaxed);
        self.inner.available.notify_one();

        tracing::info!(job_id = %job.id, to = %job.to, "Job enqueued");
        self.inner.observer.on_enqueued(&job);
        Ok(())
    }

    /// Wait for the next job from either lane.
    ///
    /// Returns [`MailQError::Cancelled`] once `shutdown` fires while no job
    /// is available. A fired signal does not stop jobs from being handed
    /// out: consumers keep draining both lanes until they are empty. When
    /// both lanes hold jobs the retry lane is served first, but callers must
    /// not rely on any ordering across lanes.
    pub async fn dequeue(&self, shutdown: &ShutdownSignal) -> MailQResult<EmailJob> {
        loop {
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let popped = {
                let mut lanes = self.inner.lock_lanes();
                lanes.pop().map(|(job, lane)| (job, lane, !lanes.is_empty()))
            };

            if let Some((job, lane, more)) = popped {
                if more {
                    // Pass the wakeup on so another idle consumer picks up the rest.
                    self.inner.available.notify_one();
                }
                self.inner.observer.on_dequeued(&job, lane);
                tracing::debug!(job_id = %job.id, lane = lane.as_str(), "Job dequeued");
                return Ok(job);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = shutdown.cancelled() => return Err(MailQError::Cancelled),
            }
        }
    }

    /// Record a failed attempt and either requeue the job after a delay or
    /// dead-letter it.
    ///
    /// The delayed re-insert runs on a detached task that is not tied to
    /// [`close`](Self::close): if the queue closes, or the retry lane is
    /// full, when the delay elapses, the job is dropped and only a warning
    /// is logged.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule_retry(&self, mut job: EmailJob) {
        let retries = job.record_failure();

        match self.inner.policy.decide(retries) {
            RetryDecision::DeadLetter => {
                tracing::error!(
                    job_id = %job.id,
                    to = %job.to,
                    retries,
                    "Job moved to dead letter queue"
                );
                self.inner.write_state().dead_letter.push(job.clone());
                self.inner.observer.on_dead_lettered(&job);
            }
            RetryDecision::Requeue { delay } => {
                self.inner.observer.on_retry_scheduled(&job, delay);
                tracing::debug!(
                    job_id = %job.id,
                    retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retry scheduled"
                );

                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.requeue(job);
                });
            }
        }
    }

    /// Record a successful delivery.
    pub fn mark_success(&self, job: &EmailJob) {
        self.inner.observer.on_success(job);
        tracing::info!(job_id = %job.id, to = %job.to, "Job completed successfully");
    }

    /// Stop accepting jobs into either lane. Idempotent.
    ///
    /// Jobs already in the lanes stay available to consumers. Pending retry
    /// timers are not cancelled.
    pub fn close(&self) {
        let mut state = self.inner.write_state();
        if !state.closed {
            state.closed = true;
            tracing::info!("Queue closed");
        }
    }

    /// Empty both lanes, reporting every job removed.
    ///
    /// Used once consumers have stopped and nothing will ever pick these
    /// jobs up. Returns the number of jobs discarded.
    pub fn discard_remaining(&self) -> usize {
        let discarded: Vec<(EmailJob, Lane)> = {
            let mut guard = self.inner.lock_lanes();
            let lanes = &mut *guard;
            lanes
                .retry
                .drain(..)
                .map(|job| (job, Lane::Retry))
                .chain(lanes.primary.drain(..).map(|job| (job, Lane::Primary)))
                .collect()
        };

        for (job, lane) in &discarded {
            tracing::warn!(
                job_id = %job.id,
                to = %job.to,
                retries = job.retry_count,
                lane = lane.as_str(),
                "Job discarded at shutdown"
            );
            self.inner.observer.on_discarded(job, *lane);
        }

        discarded.len()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.read_state().closed
    }

    /// Snapshot of the dead-letter store.
    pub fn get_dead_letter_jobs(&self) -> Vec<EmailJob> {
        self.inner.read_state().dead_letter.clone()
    }

    /// Point-in-time statistics. Fields are read independently.
    pub fn get_stats(&self) -> QueueStats {
        let (queue_length, retry_queue_length) = {
            let lanes = self.inner.lock_lanes();
            (lanes.primary.len(), lanes.retry.len())
        };
        let (dead_letter_count, is_closed) = {
            let state = self.inner.read_state();
            (state.dead_letter.len(), state.closed)
        };

        QueueStats {
            queue_length,
            retry_queue_length,
            dead_letter_count,
            is_closed,
            total_enqueued: self.inner.total_enqueued.load(Ordering::Relaxed),
        }
    }
}

impl QueueInner {
    fn lock_lanes(&self) -> MutexGuard<'_, Lanes> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, QueueState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, QueueState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best-effort insert into the retry lane once a backoff delay elapsed.
    fn requeue(&self, job: EmailJob) {
        let rejected = {
            let state = self.read_state();
            if state.closed {
                Some((job, "queue closed"))
            } else {
                let mut lanes = self.lock_lanes();
                if lanes.retry.len() >= self.capacity {
                    Some((job, "retry lane full"))
                } else {
                    tracing::info!(
                        job_id = %job.id,
                        to = %job.to,
                        retries = job.retry_count,
                        "Job requeued for retry"
                    );
                    lanes.retry.push_back(job);
                    None
                }
            }
        };

        match rejected {
            None => self.available.notify_one(),
            Some((job, reason)) => {
                self.observer.on_retry_dropped(&job);
                tracing::warn!(
                    job_id = %job.id,
                    to = %job.to,
                    retries = job.retry_count,
                    reason,
                    "Failed to requeue job"
                );
            }
        }
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("capacity", &self.inner.capacity)
            .field("policy", &self.inner.policy)
            .field("stats", &self.get_stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::QueueObserver;
    use crate::observer::recording::{Event, RecordingObserver};
    use std::time::{Duration, Instant};
    use tokio_test::{assert_pending, assert_ready};

    fn create_test_job(to: &str) -> EmailJob {
        EmailJob::new(to, "Test subject", "Test body")
    }

    fn config(capacity: usize, max_retries: u32) -> QueueConfig {
        QueueConfig::default()
            .with_capacity(capacity)
            .with_max_retries(max_retries)
            .with_retry_base_delay(10)
    }

    #[tokio::test]
    async fn test_enqueue_dequeue() {
        let queue = JobQueue::new(&config(4, 3));
        let shutdown = ShutdownSignal::new();
        let job = create_test_job("a@example.com");
        let id = job.id.clone();

        queue.enqueue(job).unwrap();
        assert_eq!(queue.get_stats().queue_length, 1);

        let dequeued = queue.dequeue(&shutdown).await.unwrap();
        assert_eq!(dequeued.id, id);
        assert_eq!(queue.get_stats().queue_length, 0);
        assert_eq!(queue.get_stats().total_enqueued, 1);
    }

    #[tokio::test]
    async fn test_fifo_within_lane() {
        let queue = JobQueue::new(&config(4, 3));
        let shutdown = ShutdownSignal::new();
        let ids: Vec<_> = (0..3)
            .map(|i| {
                let job = create_test_job(&format!("user{i}@example.com"));
                let id = job.id.clone();
                queue.enqueue(job).unwrap();
                id
            })
            .collect();

        for id in ids {
            assert_eq!(queue.dequeue(&shutdown).await.unwrap().id, id);
        }
    }

    #[tokio::test]
    async fn test_enqueue_full_fails_fast() {
        let queue = JobQueue::new(&config(1, 2));

        queue.enqueue(create_test_job("a@example.com")).unwrap();

        let started = Instant::now();
        let result = queue.enqueue(create_test_job("b@example.com"));
        assert!(started.elapsed() < Duration::from_millis(10));
        assert!(matches!(result, Err(MailQError::QueueFull { capacity: 1 })));
        assert_eq!(queue.get_stats().queue_length, 1);
    }

    #[tokio::test]
    async fn test_enqueue_after_close() {
        let queue = JobQueue::new(&config(4, 2));
        queue.close();
        queue.close();

        for _ in 0..3 {
            let result = queue.enqueue(create_test_job("a@example.com"));
            assert!(matches!(result, Err(MailQError::QueueClosed)));
        }
        assert!(queue.get_stats().is_closed);
        assert_eq!(queue.get_stats().total_enqueued, 0);
    }

    #[tokio::test]
    async fn test_closed_takes_precedence_over_full() {
        let queue = JobQueue::new(&config(1, 2));
        queue.enqueue(create_test_job("a@example.com")).unwrap();
        queue.close();

        let result = queue.enqueue(create_test_job("b@example.com"));
        assert!(matches!(result, Err(MailQError::QueueClosed)));
    }

    #[tokio::test]
    async fn test_close_keeps_queued_jobs() {
        let queue = JobQueue::new(&config(4, 2));
        let shutdown = ShutdownSignal::new();
        queue.enqueue(create_test_job("a@example.com")).unwrap();
        queue.close();

        assert!(queue.dequeue(&shutdown).await.is_ok());
    }

    #[tokio::test]
    async fn test_dequeue_blocks_until_job_arrives() {
        let queue = JobQueue::new(&config(4, 2));
        let shutdown = ShutdownSignal::new();

        let mut pending = tokio_test::task::spawn(queue.dequeue(&shutdown));
        assert_pending!(pending.poll());

        let job = create_test_job("a@example.com");
        let id = job.id.clone();
        queue.enqueue(job).unwrap();

        assert!(pending.is_woken());
        let job = assert_ready!(pending.poll()).unwrap();
        assert_eq!(job.id, id);
    }

    #[tokio::test]
    async fn test_dequeue_cancelled() {
        let queue = JobQueue::new(&config(4, 2));
        let shutdown = ShutdownSignal::new();

        let mut pending = tokio_test::task::spawn(queue.dequeue(&shutdown));
        assert_pending!(pending.poll());

        shutdown.trigger();
        assert!(pending.is_woken());
        assert!(matches!(
            assert_ready!(pending.poll()),
            Err(MailQError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_retry_requeues_same_job_after_delay() {
        let queue = JobQueue::new(&config(4, 3));
        let shutdown = ShutdownSignal::new();
        let job = create_test_job("a@example.com");
        let id = job.id.clone();
        let created_at = job.created_at;

        queue.enqueue(job).unwrap();
        let job = queue.dequeue(&shutdown).await.unwrap();
        queue.schedule_retry(job);

        // Not in a lane until the 10ms backoff elapses
        assert_eq!(queue.get_stats().retry_queue_length, 0);

        let retried = tokio::time::timeout(Duration::from_secs(1), queue.dequeue(&shutdown))
            .await
            .expect("retry should arrive")
            .unwrap();
        assert_eq!(retried.id, id);
        assert_eq!(retried.created_at, created_at);
        assert_eq!(retried.retry_count, 1);
    }

    #[tokio::test]
    async fn test_retry_delay_is_linear() {
        let observer = Arc::new(RecordingObserver::default());
        let queue = JobQueue::with_observer(&config(4, 4), observer.clone());
        let mut job = create_test_job("a@example.com");
        job.retry_count = 2;
        let id = job.id.clone();

        queue.schedule_retry(job);

        assert!(
            observer
                .events()
                .contains(&Event::RetryScheduled(id, Duration::from_millis(30)))
        );
    }

    #[tokio::test]
    async fn test_dead_letter_after_single_failure() {
        let observer = Arc::new(RecordingObserver::default());
        let queue = JobQueue::with_observer(&config(4, 1), observer.clone());
        let shutdown = ShutdownSignal::new();
        let original = create_test_job("a@example.com");

        queue.enqueue(original.clone()).unwrap();
        let job = queue.dequeue(&shutdown).await.unwrap();
        queue.schedule_retry(job);

        let dead = queue.get_dead_letter_jobs();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].retry_count, 1);
        assert_eq!(dead[0].id, original.id);
        assert_eq!(dead[0].to, original.to);
        assert_eq!(dead[0].subject, original.subject);
        assert_eq!(dead[0].body, original.body);
        assert_eq!(dead[0].created_at, original.created_at);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = queue.get_stats();
        assert_eq!(stats.queue_length, 0);
        assert_eq!(stats.retry_queue_length, 0);
        assert_eq!(stats.dead_letter_count, 1);
        assert!(
            !observer
                .events()
                .iter()
                .any(|e| matches!(e, Event::RetryScheduled(..)))
        );
    }

    #[tokio::test]
    async fn test_dead_letter_snapshot_is_a_copy() {
        let queue = JobQueue::new(&config(4, 1));
        queue.schedule_retry(create_test_job("a@example.com"));

        let snapshot = queue.get_dead_letter_jobs();
        queue.schedule_retry(create_test_job("b@example.com"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(queue.get_dead_letter_jobs().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_timer_after_close_drops_job() {
        let observer = Arc::new(RecordingObserver::default());
        let queue = JobQueue::with_observer(&config(4, 3), observer.clone());
        let job = create_test_job("a@example.com");
        let id = job.id.clone();

        queue.schedule_retry(job);
        queue.close();

        tokio::time::sleep(Duration::from_millis(60)).await;

        let stats = queue.get_stats();
        assert_eq!(stats.retry_queue_length, 0);
        assert_eq!(stats.dead_letter_count, 0);
        assert!(observer.events().contains(&Event::RetryDropped(id)));
    }

    #[tokio::test]
    async fn test_retry_lane_full_drops_job() {
        let observer = Arc::new(RecordingObserver::default());
        let queue = JobQueue::with_observer(&config(1, 3), observer.clone());
        let first = create_test_job("a@example.com");
        let second = create_test_job("b@example.com");
        let second_id = second.id.clone();

        queue.schedule_retry(first);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(queue.get_stats().retry_queue_length, 1);

        queue.schedule_retry(second);
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(queue.get_stats().retry_queue_length, 1);
        assert!(observer.events().contains(&Event::RetryDropped(second_id)));
    }

    #[tokio::test]
    async fn test_observer_sees_transitions() {
        let observer = Arc::new(RecordingObserver::default());
        let queue = JobQueue::with_observer(&config(4, 3), observer.clone());
        let shutdown = ShutdownSignal::new();
        let job = create_test_job("a@example.com");
        let id = job.id.clone();

        queue.enqueue(job).unwrap();
        let job = queue.dequeue(&shutdown).await.unwrap();
        queue.mark_success(&job);

        assert_eq!(
            observer.events(),
            vec![
                Event::Enqueued(id.clone()),
                Event::Dequeued(id.clone(), Lane::Primary),
                Event::Success(id),
            ]
        );
    }

    /// Reads queue stats back from inside its hooks.
    #[derive(Default)]
    struct StatsReadingObserver {
        queue: std::sync::OnceLock<JobQueue>,
        seen: Mutex<Vec<(usize, usize)>>,
    }

    impl StatsReadingObserver {
        fn record(&self) {
            if let Some(queue) = self.queue.get() {
                let stats = queue.get_stats();
                self.seen
                    .lock()
                    .unwrap()
                    .push((stats.queue_length, stats.dead_letter_count));
            }
        }
    }

    impl QueueObserver for StatsReadingObserver {
        fn on_enqueued(&self, _job: &EmailJob) {
            self.record();
        }

        fn on_dead_lettered(&self, _job: &EmailJob) {
            self.record();
        }
    }

    #[tokio::test]
    async fn test_observer_may_read_queue_from_hooks() {
        let observer = Arc::new(StatsReadingObserver::default());
        let queue = JobQueue::with_observer(&config(4, 1), observer.clone());
        let _ = observer.queue.set(queue.clone());

        let producer = {
            let queue = queue.clone();
            tokio::task::spawn_blocking(move || {
                queue.enqueue(create_test_job("a@example.com")).unwrap();
                queue.schedule_retry(create_test_job("b@example.com"));
            })
        };
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("hooks must not block the queue")
            .unwrap();

        // Each hook sees the transition it reports already applied
        assert_eq!(*observer.seen.lock().unwrap(), vec![(1, 0), (1, 1)]);
    }

    #[tokio::test]
    async fn test_dequeue_drains_after_shutdown() {
        let queue = JobQueue::new(&config(4, 2));
        let shutdown = ShutdownSignal::new();
        for i in 0..3 {
            queue
                .enqueue(create_test_job(&format!("user{i}@example.com")))
                .unwrap();
        }
        queue.close();
        shutdown.trigger();

        for _ in 0..3 {
            assert!(queue.dequeue(&shutdown).await.is_ok());
        }
        assert!(matches!(
            queue.dequeue(&shutdown).await,
            Err(MailQError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_discard_remaining_reports_each_job() {
        let observer = Arc::new(RecordingObserver::default());
        let queue = JobQueue::with_observer(&config(4, 3), observer.clone());
        let queued = create_test_job("a@example.com");
        let queued_id = queued.id.clone();
        let retried = create_test_job("b@example.com");
        let retried_id = retried.id.clone();

        queue.enqueue(queued).unwrap();
        queue.schedule_retry(retried);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(queue.get_stats().retry_queue_length, 1);

        queue.close();
        assert_eq!(queue.discard_remaining(), 2);
        assert_eq!(queue.discard_remaining(), 0);

        let stats = queue.get_stats();
        assert_eq!(stats.queue_length, 0);
        assert_eq!(stats.retry_queue_length, 0);
        let events = observer.events();
        assert!(events.contains(&Event::Discarded(queued_id, Lane::Primary)));
        assert!(events.contains(&Event::Discarded(retried_id, Lane::Retry)));
    }

    #[tokio::test]
    async fn test_each_job_dequeued_once_across_consumers() {
        let queue = JobQueue::new(&config(64, 3));
        let shutdown = ShutdownSignal::new();

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Ok(job) = queue.dequeue(&shutdown).await {
                        seen.push(job.id);
                    }
                    seen
                })
            })
            .collect();

        let mut expected: Vec<_> = (0..50)
            .map(|i| {
                let job = create_test_job(&format!("user{i}@example.com"));
                let id = job.id.clone();
                queue.enqueue(job).unwrap();
                id
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.trigger();

        let mut seen = Vec::new();
        for consumer in consumers {
            seen.extend(consumer.await.unwrap());
        }

        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
    }
}
