//! Error types for the engine.
//!
//! Component errors collapse into the kinds a caller can present: missing
//! entities, conflicts, forbidden operations, and bad arguments. Anything
//! else is an infrastructure failure carried as [`EngineError::Store`].

use commgate_core::CoreError;
use commgate_policy::PolicyError;
use commgate_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A group, principal, or rule does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate permanent rule or self-pair.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting principal may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request is malformed for the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage failure.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, EngineError::Forbidden(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, EngineError::InvalidArgument(_))
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SelfPair(_) => EngineError::Conflict(err.to_string()),
            _ => EngineError::InvalidArgument(err.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::Conflict(what) => EngineError::Conflict(what),
            StoreError::Rule(core) => core.into(),
            other => EngineError::Store(other),
        }
    }
}

impl From<PolicyError> for EngineError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::PrincipalNotFound(id) => EngineError::NotFound(format!("principal {}", id)),
            PolicyError::Forbidden(why) => EngineError::Forbidden(why),
            PolicyError::Core(core) => core.into(),
            PolicyError::Store(store) => store.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use commgate_core::{GroupId, PrincipalId, RuleId};

    #[test]
    fn test_store_kinds_are_preserved() {
        let err: EngineError = StoreError::NotFound("rule 3".into()).into();
        assert!(err.is_not_found());

        let err: EngineError = StoreError::Conflict("pair".into()).into();
        assert!(err.is_conflict());

        let err: EngineError = StoreError::Poisoned("lock".into()).into();
        assert!(matches!(err, EngineError::Store(_)));
    }

    #[test]
    fn test_core_errors_map_to_caller_kinds() {
        let err: EngineError = StoreError::Rule(CoreError::NotTemporary(RuleId(1))).into();
        assert!(err.is_invalid_argument());

        let err: EngineError = CoreError::SelfPair(GroupId(2)).into();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_policy_errors() {
        let err: EngineError = PolicyError::PrincipalNotFound(PrincipalId(9)).into();
        assert_eq!(err.to_string(), "not found: principal 9");

        let err: EngineError = PolicyError::Forbidden("nope".into()).into();
        assert!(err.is_forbidden());
    }
}
