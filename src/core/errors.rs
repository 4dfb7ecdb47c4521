/*!
 * Error Types
 * Wait errors with thiserror, miette and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for wait operations
pub type WaitResult<T> = Result<T, WaitError>;

/// Why a caller's context stopped the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The context's token was cancelled explicitly
    Cancelled,
    /// The context's deadline passed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("context cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Errors surfaced by [`WaitCoordinator::wait`](crate::core::sync::WaitCoordinator::wait)
///
/// Both variants leave the registry without an entry for the key.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum WaitError {
    #[error("wait unlock timeout after {timeout_ms}ms")]
    #[diagnostic(
        code(lock_wait::timeout),
        help("The holder did not release the key within the configured wait budget. Retry or raise the timeout.")
    )]
    Timeout { timeout_ms: u64 },

    #[error("wait cancelled: {0}")]
    #[diagnostic(
        code(lock_wait::cancelled),
        help("The caller's context was cancelled or its deadline passed before the key was released.")
    )]
    Cancelled(CancelReason),
}

impl WaitError {
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled(_))
    }

    /// The context's reason, if this error came from cancellation
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            WaitError::Cancelled(reason) => Some(*reason),
            WaitError::Timeout { .. } => None,
        }
    }
}
