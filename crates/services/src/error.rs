//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by lifecycle transitions.
///
/// `Conflict` is a business-rule refusal: the reason is shown verbatim to
/// the initiating participant, no state was mutated, and the same call is
/// safe to retry once the condition changes. `Invariant` means the registry
/// and reality disagree, which is a bug; the controller logs it at high
/// severity, the operation aborts, and the control loop keeps processing
/// events.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    #[error("{0}")]
    Conflict(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LifecycleError {
    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    /// True for business-rule refusals that are safe to retry.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
