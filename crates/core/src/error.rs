//! Domain error model.

use thiserror::Error;

/// Result type used across the engine.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures the caller can act on
/// (validation, missing references, data-integrity faults). Access denial is
/// never an error — the decision engine returns it as a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed legacy input, scope/level
    /// incompatibility).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not resolve.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A data-integrity fault (e.g. cycle in the institution tree or the
    /// permission dependency graph).
    #[error("integrity fault: {0}")]
    IntegrityFault(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::IntegrityFault(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
