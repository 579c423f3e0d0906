// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use reattempt::{Recoverability, Retryable};

/// Backend error taxonomy.
///
/// Errors are `Clone` because a deduplicated request broadcasts its result
/// to every attached caller. The variants carry the backend's message
/// rather than a source error for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The backend did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend answered but refused service (overload, maintenance).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The mutation violates a constraint (uniqueness, foreign key,
    /// row-level security).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The request itself is malformed (unknown table or column).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A single-row read matched nothing.
    #[error("row not found")]
    NotFound,

    /// Anything the backend reported that fits no other variant.
    #[error("{0}")]
    Other(String),
}

impl Retryable for StoreError {
    fn recoverability(&self) -> Recoverability {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Unavailable(_) => Recoverability::Transient,
            Self::Constraint(_) | Self::InvalidRequest(_) | Self::NotFound => Recoverability::Permanent,
            Self::Other(_) => Recoverability::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        assert!(StoreError::Network("refused".into()).recoverability().is_transient());
        assert!(StoreError::Timeout("10s".into()).recoverability().is_transient());
        assert!(StoreError::Unavailable("maintenance".into()).recoverability().is_transient());
    }

    #[test]
    fn request_failures_are_permanent() {
        assert_eq!(StoreError::Constraint("dup".into()).recoverability(), Recoverability::Permanent);
        assert_eq!(StoreError::NotFound.recoverability(), Recoverability::Permanent);
    }

    #[test]
    fn unclassified_failures_are_not_retried_by_default() {
        assert!(!StoreError::Other("?".into()).recoverability().is_transient());
    }
}
