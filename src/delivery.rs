//! Delivery capability used by workers to actually send a job.
//!
//! mailq never sends mail itself. Workers hand each dequeued job to a
//! [`Mailer`] under a per-attempt deadline; any error, or running past the
//! deadline, counts as a failed attempt.

use crate::error::{MailQError, MailQResult};
use crate::job::EmailJob;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Something that can deliver an email job.
///
/// Implementations must not touch the queue. Dropping the returned future
/// must abandon the attempt: workers enforce the deadline by doing exactly
/// that.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Attempt delivery once.
    async fn deliver(&self, job: &EmailJob) -> MailQResult<()>;
}

/// Stand-in mailer that sleeps and then fails at random.
#[derive(Debug, Clone)]
pub struct SimulatedMailer {
    latency: Duration,
    failure_rate: f64,
}

impl SimulatedMailer {
    /// Create a simulated mailer. `failure_rate` is clamped to `0.0..=1.0`;
    /// NaN is treated as `0.0`.
    pub fn new(latency: Duration, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            latency,
            failure_rate,
        }
    }

    /// A mailer that always succeeds after `latency`.
    pub fn reliable(latency: Duration) -> Self {
        Self::new(latency, 0.0)
    }
}

impl Default for SimulatedMailer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 0.1)
    }
}

#[async_trait]
impl Mailer for SimulatedMailer {
    async fn deliver(&self, job: &EmailJob) -> MailQResult<()> {
        tokio::time::sleep(self.latency).await;

        if rand::thread_rng().gen_bool(self.failure_rate) {
            tracing::error!(job_id = %job.id, to = %job.to, retry = job.retry_count, "Failed to send email");
            return Err(MailQError::delivery_msg(format!(
                "failed to send email to {}",
                job.to
            )));
        }

        tracing::info!(
            job_id = %job.id,
            to = %job.to,
            subject = %job.subject,
            retry = job.retry_count,
            "Email sent successfully"
        );
        Ok(())
    }
}
