//! Error types for the templates crate.
//!
//! - `ExpressionError`: Parsing or evaluating a condition/output expression
//! - `TemplateError`: Loading, selecting and rendering response templates
//!
//! Everything except `NoViableTemplate` is a configuration problem and
//! surfaces when the template bank is loaded.

use std::fmt;

/// Errors from the sandboxed expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// The expression text is malformed.
    Syntax { position: usize, message: String },
    /// A variable that the environment does not define.
    UnknownVariable { name: String },
    /// A function that the environment does not define.
    UnknownFunction { name: String },
    /// A function was called with the wrong number of arguments.
    Arity {
        function: String,
        expected: String,
        found: usize,
    },
    /// An operator or function was applied to unsuitable values.
    Type { message: String },
    /// Division or remainder by zero.
    DivisionByZero,
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { position, message } => {
                write!(f, "syntax error at offset {position}: {message}")
            }
            Self::UnknownVariable { name } => write!(f, "unknown variable '{name}'"),
            Self::UnknownFunction { name } => write!(f, "unknown function '{name}'"),
            Self::Arity {
                function,
                expected,
                found,
            } => write!(
                f,
                "function '{function}' takes {expected} arguments, {found} given"
            ),
            Self::Type { message } => write!(f, "type error: {message}"),
            Self::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for ExpressionError {}

/// Errors from response templates.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// No candidate exists for the intent, or none passes its condition.
    ///
    /// Recoverable: callers may render a literal string instead.
    NoViableTemplate { intent: String, candidates: usize },
    /// A template with no text.
    EmptyTemplate { intent: String },
    /// A template flagged with more than one classification.
    ConflictingClassification { intent: String },
    /// Template markup is malformed.
    Syntax { template: String, reason: String },
    /// An expression failed while rendering.
    Render {
        template: String,
        error: ExpressionError,
    },
    /// A template source could not be read or parsed.
    Load { source: String, reason: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoViableTemplate { intent, candidates } if *candidates == 0 => {
                write!(f, "no template exists for intent '{intent}'")
            }
            Self::NoViableTemplate { intent, candidates } => write!(
                f,
                "none of the {candidates} templates for intent '{intent}' fits the current conditions"
            ),
            Self::EmptyTemplate { intent } => {
                write!(f, "template for intent '{intent}' has no text")
            }
            Self::ConflictingClassification { intent } => write!(
                f,
                "template for intent '{intent}' may be only one of prefix, suffix or conjunction"
            ),
            Self::Syntax { template, reason } => {
                write!(f, "malformed template {template:?}: {reason}")
            }
            Self::Render { template, error } => {
                write!(f, "failed to render {template:?}: {error}")
            }
            Self::Load { source, reason } => {
                write!(f, "failed to load templates from {source}: {reason}")
            }
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl TemplateError {
    /// Whether callers may recover by rendering a literal instead.
    #[must_use]
    pub fn is_no_viable_template(&self) -> bool {
        matches!(self, Self::NoViableTemplate { .. })
    }
}
