//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `DialogStateError`: Rejected dialog state transitions
//! - `QuestionnaireError`: Invalid questionnaire definitions (fatal at load)
//! - `AnswerStoreError`: Failures of the answer persistence collaborator
//! - `ContextError`: Errors from context operations

use std::fmt;

/// Errors from dialog state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogStateError {
    /// A finite lifetime must be at least one turn.
    InvalidLifetime { state: String },
}

impl fmt::Display for DialogStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLifetime { state } => {
                write!(f, "state '{state}' needs a lifetime of at least one turn")
            }
        }
    }
}

impl std::error::Error for DialogStateError {}

/// Errors from loading questionnaire definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionnaireError {
    /// The same question or questionnaire id appears twice.
    DuplicateId { id: String },
    /// A question refers to a validator that was never registered.
    UnknownValidator { question: String, validator: String },
    /// A question's `match_regex` does not compile.
    InvalidPattern { question: String, reason: String },
    /// A questionnaire has no questions.
    Empty { questionnaire: String },
    /// The definition file could not be parsed.
    Parse { reason: String },
}

impl fmt::Display for QuestionnaireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "duplicate questionnaire or question id: {id}"),
            Self::UnknownValidator {
                question,
                validator,
            } => {
                write!(f, "question '{question}' uses unregistered validator '{validator}'")
            }
            Self::InvalidPattern { question, reason } => {
                write!(f, "invalid match_regex for question '{question}': {reason}")
            }
            Self::Empty { questionnaire } => {
                write!(f, "questionnaire '{questionnaire}' has no questions")
            }
            Self::Parse { reason } => write!(f, "failed to parse questionnaires: {reason}"),
        }
    }
}

impl std::error::Error for QuestionnaireError {}

/// Errors from the answer store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerStoreError {
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for AnswerStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => write!(f, "answer storage failed: {reason}"),
        }
    }
}

impl std::error::Error for AnswerStoreError {}

/// Errors from context operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The question id is not part of any questionnaire.
    UnknownQuestion { id: String },
    /// The answer store rejected an operation.
    Answers(AnswerStoreError),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownQuestion { id } => write!(f, "unknown question: {id}"),
            Self::Answers(e) => write!(f, "context answers unavailable: {e}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Answers(e) => Some(e),
            Self::UnknownQuestion { .. } => None,
        }
    }
}

impl From<AnswerStoreError> for ContextError {
    fn from(e: AnswerStoreError) -> Self {
        Self::Answers(e)
    }
}
