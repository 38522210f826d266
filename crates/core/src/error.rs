//! Engine errors
//!
//! Every operation returns one of these synchronously. None are retried
//! inside the engine.

use thiserror::Error;

/// Result alias used across the engine crates
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by LevelBank operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds for {user}: available {available}, required {required}")]
    InsufficientFunds {
        user: String,
        available: u64,
        required: u64,
    },

    #[error("Amount {requested} exceeds withdrawal limit {limit}")]
    ExceedsLimit { requested: u64, limit: u64 },

    #[error("{0} already has a referrer")]
    DuplicateMembership(String),

    #[error("{0} cannot refer themselves")]
    SelfReferral(String),

    #[error("Referral from {referrer} to {new_member} would create a cycle")]
    CycleDetected {
        referrer: String,
        new_member: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unauthorized")]
    Unauthorized,

    // === Registration / input validation ===

    #[error("{0} is already registered")]
    AlreadyRegistered(String),

    #[error("Phone number already in use: {0}")]
    PhoneInUse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Short stable code, used as a structured logging field
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidAmount(_) => "invalid_amount",
            EngineError::InsufficientFunds { .. } => "insufficient_funds",
            EngineError::ExceedsLimit { .. } => "exceeds_limit",
            EngineError::DuplicateMembership(_) => "duplicate_membership",
            EngineError::SelfReferral(_) => "self_referral",
            EngineError::CycleDetected { .. } => "cycle_detected",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::Unauthorized => "unauthorized",
            EngineError::AlreadyRegistered(_) => "already_registered",
            EngineError::PhoneInUse(_) => "phone_in_use",
            EngineError::InvalidInput(_) => "invalid_input",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EngineError::InsufficientFunds {
            user: "alice".into(),
            available: 5,
            required: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds for alice: available 5, required 10"
        );
        assert_eq!(EngineError::Unauthorized.to_string(), "Unauthorized");
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            EngineError::InvalidAmount(String::new()),
            EngineError::ExceedsLimit { requested: 2, limit: 1 },
            EngineError::DuplicateMembership(String::new()),
            EngineError::SelfReferral(String::new()),
            EngineError::NotFound(String::new()),
            EngineError::InvalidState(String::new()),
            EngineError::Unauthorized,
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
