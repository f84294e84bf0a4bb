//! Side-channel observation of queue and pool transitions.
//!
//! The queue calls these hooks on every state transition. Nothing in the
//! queue or the pool reads back from an observer, so [`NoopObserver`] can
//! always stand in for a real one.
//!
//! Hooks are called after the queue has released its locks, so an observer
//! may call back into the queue (for example [`JobQueue::get_stats`]). Hooks
//! for different jobs may arrive out of order across threads.
//!
//! [`JobQueue::get_stats`]: crate::queue::JobQueue::get_stats

use crate::job::EmailJob;
use std::sync::Arc;
use std::time::Duration;

/// Lane a job was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Jobs awaiting their first dispatch
    Primary,
    /// Jobs awaiting redispatch after a backoff delay
    Retry,
}

impl Lane {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Primary => "primary",
            Lane::Retry => "retry",
        }
    }
}

/// Hooks invoked by the queue on state transitions. All default to no-ops.
pub trait QueueObserver: Send + Sync {
    /// A job was accepted into the primary lane
    fn on_enqueued(&self, _job: &EmailJob) {}

    /// A job was handed to a worker
    fn on_dequeued(&self, _job: &EmailJob, _lane: Lane) {}

    /// A delivery attempt succeeded
    fn on_success(&self, _job: &EmailJob) {}

    /// A failed job will re-enter the retry lane after `delay`
    fn on_retry_scheduled(&self, _job: &EmailJob, _delay: Duration) {}

    /// A delayed retry could not be re-inserted and the job was dropped
    fn on_retry_dropped(&self, _job: &EmailJob) {}

    /// A job exhausted its retries and was moved to the dead-letter store
    fn on_dead_lettered(&self, _job: &EmailJob) {}

    /// A job was still waiting in `lane` when the pool gave up draining it
    /// during shutdown
    fn on_discarded(&self, _job: &EmailJob, _lane: Lane) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl QueueObserver for NoopObserver {}

/// Shared observer handle
pub type SharedObserver = Arc<dyn QueueObserver>;

/// Default observer handle.
pub fn noop() -> SharedObserver {
    Arc::new(NoopObserver)
}

#[cfg(test)]
pub(crate) mod recording {
    //! Observer that records every event, for tests.

    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Enqueued(String),
        Dequeued(String, Lane),
        Success(String),
        RetryScheduled(String, Duration),
        RetryDropped(String),
        DeadLettered(String),
        Discarded(String, Lane),
    }

    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }

        fn push(&self, event: Event) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    impl QueueObserver for RecordingObserver {
        fn on_enqueued(&self, job: &EmailJob) {
            self.push(Event::Enqueued(job.id.clone()));
        }

        fn on_dequeued(&self, job: &EmailJob, lane: Lane) {
            self.push(Event::Dequeued(job.id.clone(), lane));
        }

        fn on_success(&self, job: &EmailJob) {
            self.push(Event::Success(job.id.clone()));
        }

        fn on_retry_scheduled(&self, job: &EmailJob, delay: Duration) {
            self.push(Event::RetryScheduled(job.id.clone(), delay));
        }

        fn on_retry_dropped(&self, job: &EmailJob) {
            self.push(Event::RetryDropped(job.id.clone()));
        }

        fn on_dead_lettered(&self, job: &EmailJob) {
            self.push(Event::DeadLettered(job.id.clone()));
        }

        fn on_discarded(&self, job: &EmailJob, lane: Lane) {
            self.push(Event::Discarded(job.id.clone(), lane));
        }
    }
}
