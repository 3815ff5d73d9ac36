//! Error types for the dialog crate.
//!
//! - `ComposeError`: Invalid message sequences built by handlers
//! - `HandlerError`: What rule callbacks return when they fail
//! - `TurnError`: Turn-level failures, carried in a rootcause `Report`
//! - `ClientError`: Failures of the bot and NLU collaborators

use parlance_conversation::ContextError;
use parlance_templates::TemplateError;
use std::fmt;

/// Errors from assembling outgoing messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeError {
    /// A second action in the same turn offered quick-reply choices.
    MultipleChoiceActions { intent: String },
    /// A conjunction template followed a finished sentence.
    ConjunctionAfterSentenceEnd { intent: String },
    /// A continuation template had no text to attach to.
    NothingToAppendTo { intent: String },
    /// A question lacks the text an operation needs (hint, example, ...).
    MissingQuestionText { question: String, part: &'static str },
    /// Selecting or rendering a template failed.
    Template(TemplateError),
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleChoiceActions { intent } => write!(
                f,
                "'{intent}' adds choices, but another message of this turn already has some"
            ),
            Self::ConjunctionAfterSentenceEnd { intent } => write!(
                f,
                "conjunction '{intent}' cannot follow a finished sentence"
            ),
            Self::NothingToAppendTo { intent } => {
                write!(f, "'{intent}' continues a message that has no text")
            }
            Self::MissingQuestionText { question, part } => {
                write!(f, "question '{question}' has no {part}")
            }
            Self::Template(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TemplateError> for ComposeError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}

/// Errors returned by rule callbacks.
#[derive(Debug)]
pub enum HandlerError {
    /// The response could not be composed.
    Compose(ComposeError),
    /// Reading or updating the context failed.
    Context(ContextError),
    /// A handler needed a current question, but the questionnaires are done.
    NoCurrentQuestion,
    /// Any other handler-specific failure.
    Failed { reason: String },
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compose(e) => write!(f, "composing the response failed: {e}"),
            Self::Context(e) => write!(f, "context operation failed: {e}"),
            Self::NoCurrentQuestion => write!(f, "there is no current question"),
            Self::Failed { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Compose(e) => Some(e),
            Self::Context(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ComposeError> for HandlerError {
    fn from(e: ComposeError) -> Self {
        Self::Compose(e)
    }
}

impl From<TemplateError> for HandlerError {
    fn from(e: TemplateError) -> Self {
        Self::Compose(ComposeError::Template(e))
    }
}

impl From<ContextError> for HandlerError {
    fn from(e: ContextError) -> Self {
        Self::Context(e)
    }
}

/// Turn-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// The context has no user utterance to respond to.
    MissingUtterance { user: String },
    /// A rule callback failed.
    HandlerFailed { handler: String, reason: String },
    /// A rule callback returned a transition the dialog states reject.
    InvalidTransition { handler: String, reason: String },
    /// The NLU collaborator could not interpret a message.
    UnderstandingFailed { user: String, reason: String },
    /// The user's context could not be created.
    ContextUnavailable { user: String, reason: String },
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingUtterance { user } => {
                write!(f, "no user utterance to respond to for {user}")
            }
            Self::HandlerFailed { handler, reason } => {
                write!(f, "handler '{handler}' failed: {reason}")
            }
            Self::InvalidTransition { handler, reason } => {
                write!(f, "handler '{handler}' returned an invalid transition: {reason}")
            }
            Self::UnderstandingFailed { user, reason } => {
                write!(f, "could not understand message of {user}: {reason}")
            }
            Self::ContextUnavailable { user, reason } => {
                write!(f, "context of {user} is unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for TurnError {}

/// Errors from the transport collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Actions could not be delivered.
    SendFailed { client: String, reason: String },
    /// The NLU service failed.
    UnderstandingFailed { reason: String },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed { client, reason } => {
                write!(f, "{client} could not send actions: {reason}")
            }
            Self::UnderstandingFailed { reason } => write!(f, "understanding failed: {reason}"),
        }
    }
}

impl std::error::Error for ClientError {}
