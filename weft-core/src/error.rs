//! Error types for tracked reads, writes and computations.

use std::sync::Arc;

/// Errors raised by the reactive layer.
///
/// The enum is `Clone` because a single in-flight computation hands its
/// outcome to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReactiveError {
    /// A tracked read happened with no change tracker bound.
    ///
    /// Always fatal to the operation that attempted the read.
    #[error("no active change tracker, can not read from reactive value")]
    NoActiveTracker,

    /// A write went through a container that is not attached to a tracker.
    #[error("reactive value can not be modified before it is attached to a change tracker")]
    DetachedWrite,

    /// A read-only scene observed a change.
    #[error("detected readonly scene `{scene}` changed {atom}")]
    ReadonlyViolation {
        /// Operation name of the offending scene.
        scene: String,
        /// Description of the atom that changed.
        atom: String,
    },

    /// The user computation failed.
    ///
    /// Failures are propagated to every caller of the run and never cached.
    #[error("computation failed: {0}")]
    ComputationFailure(Arc<anyhow::Error>),

    /// A typed accessor was used on a value of a different shape.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// The shape the accessor needs.
        expected: &'static str,
        /// The shape actually stored.
        found: &'static str,
    },

    /// A cursor path no longer resolves to a value.
    #[error("no value at {path}")]
    MissingPath {
        /// Human readable path, e.g. `a.b[0]`.
        path: String,
    },

    /// A write was attempted through a set member cursor.
    ///
    /// Members are read-only; change a set with `add` and `delete`.
    #[error("set member {path} can not be modified in place")]
    SetMemberWrite {
        /// Human readable path of the member.
        path: String,
    },
}

impl From<anyhow::Error> for ReactiveError {
    fn from(err: anyhow::Error) -> Self {
        ReactiveError::ComputationFailure(Arc::new(err))
    }
}

impl ReactiveError {
    /// Wrap any error as a computation failure.
    pub fn computation<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        ReactiveError::ComputationFailure(Arc::new(err.into()))
    }

    /// Returns `true` for failures raised by a user computation.
    pub fn is_computation_failure(&self) -> bool {
        matches!(self, ReactiveError::ComputationFailure(_))
    }

    /// Attempts to downcast a computation failure to a specific error type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        match self {
            ReactiveError::ComputationFailure(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct DiskError;

    #[test]
    fn anyhow_errors_become_computation_failures() {
        let err: ReactiveError = anyhow::anyhow!("boom").into();
        assert!(err.is_computation_failure());
        assert_eq!(err.to_string(), "computation failed: boom");
    }

    #[test]
    fn computation_failure_downcasts_to_source() {
        let err = ReactiveError::computation(DiskError);
        assert!(err.downcast_ref::<DiskError>().is_some());
        assert!(ReactiveError::NoActiveTracker
            .downcast_ref::<DiskError>()
            .is_none());
    }

    #[test]
    fn clones_share_the_same_failure() {
        let err = ReactiveError::computation(DiskError);
        let cloned = err.clone();
        match (&err, &cloned) {
            (ReactiveError::ComputationFailure(a), ReactiveError::ComputationFailure(b)) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("expected computation failures"),
        }
    }
}
