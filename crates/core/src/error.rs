//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failures of order input and domain data.
///
/// Storage and transport failures have their own error types in the infra
/// and api crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Request input was rejected (empty order, non-positive quantity, bad attachment).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Data that should be impossible reached a pure function.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A key was unparseable or not a positive integer.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// True for failures caused by the caller's input rather than stored data.
    pub fn is_client_input(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidId(_))
    }
}
