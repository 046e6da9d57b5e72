//! Error types for the policy module.

use commgate_core::{CoreError, PrincipalId};
use commgate_store::StoreError;
use thiserror::Error;

/// Errors that can occur while evaluating or authorizing.
///
/// A denied communication is not an error; it is a [`Decision`](crate::Decision)
/// with `allowed == false`.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The sender or receiver is not in the directory.
    #[error("principal not found: {0}")]
    PrincipalNotFound(PrincipalId),

    /// The acting principal may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Data model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
