//! Email job definition and the request it is built from.

use crate::error::{MailQError, MailQResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a job
pub type JobId = String;

/// A queued outbound email and its retry bookkeeping.
///
/// The payload fields are never interpreted by the queue. A job keeps its
/// `id` across retries; only `retry_count` changes, and only upward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailJob {
    /// Unique job identifier
    pub id: JobId,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
    /// Number of failed delivery attempts so far
    #[serde(rename = "retries")]
    pub retry_count: u32,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl EmailJob {
    /// Create a job with a fresh v4 UUID and the current time.
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Record one failed attempt and return the new count.
    pub(crate) fn record_failure(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }
}

/// Incoming send request, as accepted by the request layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailRequest {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}

impl EmailRequest {
    /// Check that every field is present and the recipient looks like an address.
    pub fn validate(&self) -> MailQResult<()> {
        if self.to.trim().is_empty() {
            return Err(MailQError::validation("to", "email address is required"));
        }
        if self.subject.trim().is_empty() {
            return Err(MailQError::validation("subject", "subject is required"));
        }
        if self.body.trim().is_empty() {
            return Err(MailQError::validation("body", "body is required"));
        }
        if !is_plausible_address(&self.to) {
            return Err(MailQError::validation("to", "invalid email format"));
        }
        Ok(())
    }

    /// Validate the request and turn it into a fresh job.
    pub fn into_job(self) -> MailQResult<EmailJob> {
        self.validate()?;
        Ok(EmailJob::new(self.to, self.subject, self.body))
    }
}

/// Accepts `local@domain.tld` and `Name <local@domain.tld>`.
fn is_plausible_address(raw: &str) -> bool {
    let raw = raw.trim();
    let addr = match (raw.rfind('<'), raw.ends_with('>')) {
        (Some(start), true) => &raw[start + 1..raw.len() - 1],
        (None, false) => raw,
        _ => return false,
    };

    if addr.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}
