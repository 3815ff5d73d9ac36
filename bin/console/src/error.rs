//! Error types of the console front end.

use std::fmt;

/// Startup and I/O failures of the console.
#[derive(Debug)]
pub enum ConsoleError {
    /// The configuration could not be loaded.
    Config { reason: String },
    /// Templates, questionnaires, rules or intents failed to load.
    Assets { asset: &'static str, reason: String },
    /// Reading the terminal failed.
    Io { reason: String },
    /// The opening turn failed.
    Turn { reason: String },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Assets { asset, reason } => write!(f, "failed to load {asset}: {reason}"),
            Self::Io { reason } => write!(f, "terminal I/O failed: {reason}"),
            Self::Turn { reason } => write!(f, "conversation failed: {reason}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

/// Failures loading keyword intent rules.
#[derive(Debug, Clone, PartialEq)]
pub enum NluError {
    /// The rule document is malformed.
    Parse { reason: String },
    /// A rule has no patterns.
    Empty { intent: String },
    /// A pattern does not compile.
    Pattern {
        intent: String,
        pattern: String,
        reason: String,
    },
}

impl fmt::Display for NluError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { reason } => write!(f, "malformed intent rules: {reason}"),
            Self::Empty { intent } => write!(f, "intent '{intent}' has no patterns"),
            Self::Pattern {
                intent,
                pattern,
                reason,
            } => write!(f, "pattern {pattern:?} of intent '{intent}' is invalid: {reason}"),
        }
    }
}

impl std::error::Error for NluError {}
