// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Classification of error conditions by whether retrying can help.

use std::fmt::{Display, Formatter};

/// Whether a failed operation is worth re-attempting.
///
/// This describes the *condition*, not the outcome: a permanent failure and
/// a success are both [`Recoverability::Permanent`]-style "do not retry"
/// states as far as a retry loop is concerned.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Recoverability {
    /// The condition is temporary; retrying with backoff may succeed.
    Transient,

    /// The condition is permanent; retrying cannot change the outcome.
    Permanent,

    /// The condition cannot be classified.
    ///
    /// Retry loops treat unknown conditions conservatively and do not
    /// retry them by default.
    Unknown,
}

impl Recoverability {
    /// Returns whether a retry loop should re-attempt this condition.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl Display for Recoverability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Enables error types to report their recoverability.
///
/// Implement this for errors that a [`Retrier`](crate::Retrier) may see, so
/// retry decisions stay consistent wherever the error surfaces.
///
/// # Example
///
/// ```
/// use reattempt::{Recoverability, Retryable};
///
/// #[derive(Debug)]
/// enum StoreError {
///     ConnectionReset,
///     UniqueViolation,
/// }
///
/// impl Retryable for StoreError {
///     fn recoverability(&self) -> Recoverability {
///         match self {
///             StoreError::ConnectionReset => Recoverability::Transient,
///             StoreError::UniqueViolation => Recoverability::Permanent,
///         }
///     }
/// }
/// ```
pub trait Retryable {
    /// Returns the recoverability of this condition.
    fn recoverability(&self) -> Recoverability;
}

impl<T, E> Retryable for Result<T, E>
where
    T: Retryable,
    E: Retryable,
{
    fn recoverability(&self) -> Recoverability {
        match self {
            Ok(value) => value.recoverability(),
            Err(error) => error.recoverability(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Recoverability::Transient.to_string(), "transient");
        assert_eq!(Recoverability::Permanent.to_string(), "permanent");
        assert_eq!(Recoverability::Unknown.to_string(), "unknown");
    }

    #[test]
    fn only_transient_is_retried() {
        assert!(Recoverability::Transient.is_transient());
        assert!(!Recoverability::Permanent.is_transient());
        assert!(!Recoverability::Unknown.is_transient());
    }
}
