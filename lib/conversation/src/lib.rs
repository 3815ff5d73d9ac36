//! Per-user conversational memory for the parlance dialog engine.
//!
//! This crate provides:
//!
//! - **Understandings and actions**: what the user said, what the bot sends
//! - **History**: bounded, newest-first utterance log with recency lookups
//! - **Dialog states**: priority queue of states with decaying lifetimes
//! - **Questionnaires**: ordered questions with named answer validators
//! - **Context**: one per user, tying all of the above together

pub mod action;
pub mod answers;
pub mod context;
pub mod dialog_states;
pub mod error;
pub mod history;
pub mod questionnaire;
pub mod understanding;
pub mod validator;

pub use action::{ActionType, ChatAction, Delay};
pub use answers::{AnswerStore, InMemoryAnswerStore, NO_ANSWER};
pub use context::Context;
pub use dialog_states::{DialogStates, Lifetime, State, Transition};
pub use error::{AnswerStoreError, ContextError, DialogStateError, QuestionnaireError};
pub use history::{AgeLimit, DEFAULT_LOOKUP_RECENCY, HISTORY_LIMIT, History, Utterance, UtteranceKind};
pub use questionnaire::{
    Question, Questionnaire, QuestionnaireCatalog, QuestionnaireProvider, Surrounding,
};
pub use understanding::{MEDIA_INTENT, MessageUnderstanding, START_INTENT};
pub use validator::{AnswerValidator, FnValidator, ValidatorRegistry};
