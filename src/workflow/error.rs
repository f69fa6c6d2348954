use thiserror::Error;

use crate::batch::BatchStatus;
use crate::store::StoreError;

/// Failures a workflow transition can surface to its caller.
///
/// Everything here aborts the operation before any persistence happens;
/// publish failures never appear because event delivery is best-effort and
/// runs only after a successful save.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed or missing input. No mutation performed.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The referenced batch does not exist.
    #[error("batch {batch} not found")]
    NotFound { batch: String },

    /// The trigger is not valid from the batch's current status. Also raised
    /// when a concurrent transition won the race and this one read stale
    /// state, and on double confirmation under retry.
    #[error("cannot {trigger} while batch is {status}")]
    InvalidState {
        trigger: &'static str,
        status: BatchStatus,
    },

    /// The presented confirmation token does not match the stored one.
    #[error("confirmation token does not match")]
    AuthorizationMismatch,

    /// Wrapped storage failure. The source chain stays available for logs;
    /// callers see only this message.
    #[error("internal storage failure")]
    Internal(#[source] StoreError),
}

impl WorkflowError {
    pub fn validation(reason: impl Into<String>) -> Self {
        WorkflowError::Validation {
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        WorkflowError::Internal(err)
    }
}
