//! Prometheus metrics for the job queue.
//!
//! Exposes the same two series as the service this crate backs:
//! `email_queue_length` and `email_jobs_processed_total{status}`.

use crate::error::MailQResult;
use crate::job::EmailJob;
use crate::observer::{Lane, QueueObserver};
use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

/// Observer that records queue transitions as Prometheus metrics.
#[derive(Clone)]
pub struct PrometheusObserver {
    queue_length: IntGauge,
    jobs_processed: IntCounterVec,
}

impl PrometheusObserver {
    /// Create the metrics and register them in `registry`.
    pub fn register(registry: &Registry) -> MailQResult<Self> {
        let queue_length = IntGauge::new(
            "email_queue_length",
            "Current number of jobs in the queue",
        )?;
        let jobs_processed = IntCounterVec::new(
            Opts::new(
                "email_jobs_processed_total",
                "Total number of email jobs processed",
            ),
            &["status"],
        )?;

        registry.register(Box::new(queue_length.clone()))?;
        registry.register(Box::new(jobs_processed.clone()))?;

        Ok(Self {
            queue_length,
            jobs_processed,
        })
    }

    /// Current value of `email_queue_length`.
    pub fn queue_length(&self) -> i64 {
        self.queue_length.get()
    }

    /// Current value of `email_jobs_processed_total{status}`.
    pub fn processed(&self, status: &str) -> u64 {
        self.jobs_processed.with_label_values(&[status]).get()
    }
}

impl QueueObserver for PrometheusObserver {
    fn on_enqueued(&self, _job: &EmailJob) {
        self.queue_length.inc();
    }

    fn on_dequeued(&self, _job: &EmailJob, lane: Lane) {
        if lane == Lane::Primary {
            self.queue_length.dec();
        }
    }

    fn on_success(&self, _job: &EmailJob) {
        self.jobs_processed.with_label_values(&["success"]).inc();
    }

    fn on_dead_lettered(&self, _job: &EmailJob) {
        self.jobs_processed.with_label_values(&["failed"]).inc();
    }

    fn on_discarded(&self, _job: &EmailJob, lane: Lane) {
        if lane == Lane::Primary {
            self.queue_length.dec();
        }
    }
}
