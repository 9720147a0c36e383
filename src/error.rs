//! Error types for the escrow platform
//!
//! Every operation reports failure synchronously through [`EscrowError`].
//! The variants map to the business-rule taxonomy: missing entities,
//! forbidden callers, illegal state transitions, uniqueness conflicts,
//! and malformed input. Ledger-stub failures are carried by `Chain` but
//! are swallowed at the call sites that treat the chain as best-effort.

use thiserror::Error;

/// Main error type for escrow, dispute, and reputation operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Referenced escrow/dispute/user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation attempted against an entity whose status forbids it
    #[error("Invalid state: {entity} is {current}: {reason}")]
    InvalidState {
        entity: String,
        current: String,
        reason: String,
    },

    /// Caller is not an authorized participant
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation (duplicate active dispute, duplicate rating)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input (bad amount, score out of range, oversized text)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ledger collaborator failure (best-effort, logged and swallowed)
    #[error("Chain error: {0}")]
    Chain(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EscrowError {
    /// Create a not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid-state error
    pub fn invalid_state<S: Into<String>>(entity: S, current: S, reason: S) -> Self {
        Self::InvalidState {
            entity: entity.into(),
            current: current.into(),
            reason: reason.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a chain error
    pub fn chain<S: Into<String>>(msg: S) -> Self {
        Self::Chain(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}
