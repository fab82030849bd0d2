//! Error types for the governor.

use thiserror::Error;

/// Result type alias for governor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in governor operations.
///
/// Gate violations and evaluator timeouts are normally absorbed into a
/// [`DecisionResult`](crate::session::DecisionResult); only failures that
/// make a decision unrecordable reach the caller.
#[derive(Error, Debug)]
pub enum Error {
    // Proposal errors
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    // Evaluation errors
    #[error("Evaluator {0} did not respond in time")]
    EvaluationTimeout(String),

    #[error("Evaluator {member} failed: {reason}")]
    EvaluatorFailed { member: String, reason: String },

    // Ledger errors
    #[error("Ledger write failed: {0}")]
    LedgerWriteFailure(String),

    #[error("Ledger writer is closed")]
    LedgerClosed,

    #[error("Ledger chain integrity violated at sequence {0}")]
    ChainIntegrityViolated(u64),

    // Fork lineage errors
    #[error("Fork lineage not found: {0}")]
    LineageNotFound(String),

    #[error("Fork lineage already exists: {0}")]
    DuplicateLineage(String),

    #[error("Decision {record} is not part of lineage {lineage}")]
    DecisionNotInLineage { lineage: String, record: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration version {offered} is not newer than active version {active}")]
    StaleConfig { active: u64, offered: u64 },

    #[error("Duplicate voting member: {0}")]
    DuplicateMember(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::StaleConfig {
            active: 3,
            offered: 2,
        };
        assert!(err.to_string().contains("not newer"));

        let err = Error::EvaluationTimeout("guardian".to_string());
        assert_eq!(err.to_string(), "Evaluator guardian did not respond in time");
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{oops");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::SerializationError(_)));
    }
}
