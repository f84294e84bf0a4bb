//! # mailq
//!
//! A bounded async email job queue with a fixed worker pool, linear retry
//! backoff and a dead-letter store.
//!
//! ## Features
//!
//! - **Bounded, non-blocking intake**: producers get `QueueFull` or
//!   `QueueClosed` immediately instead of waiting
//! - **Retry with backoff**: the n-th failed attempt waits n base delays
//! - **Dead-lettering**: jobs that exhaust their retries are kept for inspection
//! - **Graceful shutdown**: close to producers, then stop workers
//! - **Observability**: structured `tracing` logs, pluggable observers and
//!   optional Prometheus metrics (`metrics` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use mailq::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct LogMailer;
//!
//! #[async_trait]
//! impl Mailer for LogMailer {
//!     async fn deliver(&self, job: &EmailJob) -> MailQResult<()> {
//!         tracing::info!(to = %job.to, "sending");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> MailQResult<()> {
//!     let mailq = MailQ::new(MailQConfig::testing(), Arc::new(LogMailer))?;
//!     mailq.start().await?;
//!
//!     mailq.enqueue(EmailJob::new("user@example.com", "Welcome", "Hello!"))?;
//!     tokio::time::sleep(Duration::from_millis(20)).await;
//!
//!     mailq.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod delivery;
pub mod error;
pub mod job;
pub mod logging;
pub mod observer;
pub mod queue;
pub mod shutdown;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::core::{MailQ, WorkerPool, WorkerState, WorkerStats};
    pub use crate::delivery::{Mailer, SimulatedMailer};
    pub use crate::error::{MailQError, MailQResult};
    pub use crate::job::{EmailJob, EmailRequest, JobId};
    pub use crate::observer::{Lane, NoopObserver, QueueObserver};
    pub use crate::queue::{JobQueue, QueueStats, RetryPolicy};
    pub use crate::shutdown::ShutdownSignal;
    pub use async_trait::async_trait;

    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub use crate::metrics::PrometheusObserver;
}

pub use crate::config::*;
pub use crate::core::{MailQ, WorkerPool, WorkerState, WorkerStats};
pub use crate::delivery::{Mailer, SimulatedMailer};
pub use crate::error::{MailQError, MailQResult};
pub use crate::job::{EmailJob, EmailRequest, JobId};
pub use crate::logging::init_tracing;
pub use crate::observer::{Lane, NoopObserver, QueueObserver};
pub use crate::queue::{JobQueue, QueueStats, RetryPolicy};
pub use crate::shutdown::ShutdownSignal;
pub use async_trait::async_trait;
