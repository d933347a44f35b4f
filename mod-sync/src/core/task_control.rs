//! Cooperative cancellation for long-running scans

use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};

/// Cancellation handle shared between the caller and a running scan.
/// Cloning yields a handle to the same token.
#[derive(Debug, Clone, Default)]
pub struct TaskControl {
    token: CancellationToken,
}

impl TaskControl {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn ensure_not_cancelled(&self, stage: &str) -> ApiResult<()> {
        if self.is_cancelled() {
            return Err(ApiError::cancelled(format!("{} cancelled", stage)));
        }
        Ok(())
    }
}
