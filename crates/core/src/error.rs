//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure is a synchronous validation outcome: an operation that
/// returns one of these has not mutated anything.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist.
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// Duplicate configuration or record (e.g. second alert for a product/store).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stock movement would push a quantity below zero.
    #[error("insufficient stock for {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// A return was requested after the permitted number of days.
    #[error("return window exceeded: {days} days since sale, window is {window} days")]
    ReturnWindowExpired { days: i64, window: i64 },

    /// The document is not in a state that allows the requested action.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
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

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingReference(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn insufficient_stock(item: impl Into<String>, available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            item: item.into(),
            available,
            requested,
        }
    }

    /// True for the stock shortfall variant (handy in callers that retry with less).
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, Self::InsufficientStock { .. })
    }
}
