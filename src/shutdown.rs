//! Pool-wide cancellation signal.

use tokio_util::sync::CancellationToken;

/// Broadcast shutdown flag shared by every worker.
///
/// Triggering is permanent. Clones observe the same flag, including clones
/// created after the signal fired.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal has fired.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
