//! Question source error types.

use thiserror::Error;

use super::models::QuestionId;

#[derive(Debug, Error)]
pub enum QuestionError {
    /// The bank is empty or nothing matched the draw
    #[error("No question available")]
    NoQuestionAvailable,

    #[error("Question {id} is invalid: {reason}")]
    InvalidQuestion { id: QuestionId, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read question bank: {0}")]
    Io(#[from] std::io::Error),
}

impl QuestionError {
    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            QuestionError::NoQuestionAvailable => "No question available".to_string(),
            QuestionError::InvalidQuestion { .. } => "Question bank contains an invalid question".to_string(),
            QuestionError::Database(_) | QuestionError::Parse(_) | QuestionError::Io(_) => {
                "Question source unavailable".to_string()
            }
        }
    }
}

/// Result type for question source operations
pub type QuestionResult<T> = Result<T, QuestionError>;
