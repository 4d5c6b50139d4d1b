//! Domain errors.
//!
//! Configuration and availability problems are terminal for a run and are
//! raised before the induction engine is ever called. Empty results are
//! not errors and never show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the operator with an actionable message.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// The dataset is missing one or more required columns.
    #[error("Missing required columns in data file: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// No response field was selected for text assembly.
    #[error("No valid question columns selected. Choose at least one of q1_response..q5_response.")]
    NoQuestionsSelected,

    /// A selected response field is not one of the known fields.
    #[error("Unknown question column '{0}'. Expected one of q1_response..q5_response.")]
    UnknownQuestion(String),

    /// A configuration file value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine credential is not present in the environment.
    #[error("{0} not found. Put it in a .env file or export it in your shell.")]
    MissingCredential(String),

    /// The induction engine cannot be used in this run.
    #[error("Induction engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A replay file was requested but does not exist.
    #[error("Replay file not found: {}", .0.display())]
    ReplayNotFound(PathBuf),
}

impl ExplorerError {
    /// Whether this error is a configuration problem (as opposed to availability).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ExplorerError::MissingColumns(_)
                | ExplorerError::NoQuestionsSelected
                | ExplorerError::UnknownQuestion(_)
                | ExplorerError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_names_columns() {
        let err = ExplorerError::MissingColumns(vec!["age".to_string(), "income".to_string()]);
        let msg = err.to_string();
        assert!(msg.contains("age, income"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_credential_error_is_not_configuration() {
        let err = ExplorerError::MissingCredential("OPENAI_API_KEY".to_string());
        assert!(err.to_string().starts_with("OPENAI_API_KEY not found"));
        assert!(!err.is_configuration());
    }
}
