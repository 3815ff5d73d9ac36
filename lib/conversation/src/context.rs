//! Per-user conversational memory.
//!
//! A context holds everything the dialog engine remembers about one user:
//! - Utterance history: newest first, capped
//! - Dialog states: what the conversation is about right now
//! - Answered questions: mirrored from the answer store, drives the current question
//! - Values: free-form key/value scratch space for handlers
//!
//! Exactly one context exists per user. The transport layer records the
//! incoming understanding before a turn and the sent actions after it.

use crate::action::ChatAction;
use crate::answers::AnswerStore;
use crate::dialog_states::{DialogStates, State};
use crate::error::ContextError;
use crate::history::{AgeLimit, DEFAULT_LOOKUP_RECENCY, History, Utterance, UtteranceKind};
use crate::questionnaire::{Question, Questionnaire, QuestionnaireProvider};
use crate::understanding::MessageUnderstanding;
use parlance_core::{User, is_truthy};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Where the user currently is in the questionnaires.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Position {
    questionnaire: usize,
    question: String,
}

/// Everything the dialog engine remembers about one user.
pub struct Context {
    user: User,
    history: History,
    dialog_states: DialogStates,
    floor: State,
    answered: BTreeSet<String>,
    values: HashMap<String, JsonValue>,
    questionnaires: Arc<dyn QuestionnaireProvider>,
    answers: Arc<dyn AnswerStore>,
    position: Option<Position>,
    lookup_recency: usize,
}

impl Context {
    /// Creates the context of a user, loading already answered questions.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer store cannot be read.
    pub fn new(
        user: User,
        floor: impl Into<State>,
        questionnaires: Arc<dyn QuestionnaireProvider>,
        answers: Arc<dyn AnswerStore>,
    ) -> Result<Self, ContextError> {
        let floor = floor.into();
        let answered = answers.answered_ids(user.id)?;
        let mut context = Self {
            user,
            history: History::new(),
            dialog_states: DialogStates::new(floor.clone()),
            floor,
            answered,
            values: HashMap::new(),
            questionnaires,
            answers,
            position: None,
            lookup_recency: DEFAULT_LOOKUP_RECENCY,
        };
        context.update_question_context();
        Ok(context)
    }

    /// Sets how many utterances recency lookups inspect by default.
    #[must_use]
    pub fn with_lookup_recency(mut self, recency: usize) -> Self {
        self.lookup_recency = recency;
        self
    }

    /// The user this context belongs to.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Mutable access to the user, e.g. to switch the address register.
    pub fn user_mut(&mut self) -> &mut User {
        &mut self.user
    }

    /// Records the user's utterance and ages the dialog states by one turn.
    ///
    /// This is the only place lifetimes tick, so every turn decrements them
    /// exactly once regardless of how the turn ends.
    pub fn add_user_utterance(&mut self, understanding: MessageUnderstanding) {
        self.history.push(Utterance::User(understanding));
        self.dialog_states.update_step();
    }

    /// Records the actions sent in reply.
    pub fn add_actions(&mut self, actions: impl IntoIterator<Item = ChatAction>) {
        for action in actions {
            self.history.push(Utterance::Bot(action));
        }
    }

    /// The utterance history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The newest user utterance.
    #[must_use]
    pub fn last_user_utterance(&self) -> Option<&MessageUnderstanding> {
        self.history.last_user_utterance()
    }

    /// The active dialog states.
    #[must_use]
    pub fn dialog_states(&self) -> &DialogStates {
        &self.dialog_states
    }

    /// Mutable access to the dialog states.
    pub fn dialog_states_mut(&mut self) -> &mut DialogStates {
        &mut self.dialog_states
    }

    /// User utterances accepted by `predicate` within `age_limit`, newest first.
    pub fn filter_user_utterances<F>(
        &self,
        predicate: F,
        age_limit: impl Into<AgeLimit>,
        only_latest: bool,
    ) -> Vec<&MessageUnderstanding>
    where
        F: Fn(&MessageUnderstanding) -> bool,
    {
        self.history
            .filter(
                UtteranceKind::User,
                |u| u.as_user().is_some_and(&predicate),
                age_limit.into(),
                only_latest,
            )
            .into_iter()
            .filter_map(Utterance::as_user)
            .collect()
    }

    /// Bot actions accepted by `predicate` within `age_limit`, newest first.
    pub fn filter_outgoing_utterances<F>(
        &self,
        predicate: F,
        age_limit: impl Into<AgeLimit>,
        only_latest: bool,
    ) -> Vec<&ChatAction>
    where
        F: Fn(&ChatAction) -> bool,
    {
        self.history
            .filter(
                UtteranceKind::Bot,
                |u| u.as_bot().is_some_and(&predicate),
                age_limit.into(),
                only_latest,
            )
            .into_iter()
            .filter_map(Utterance::as_bot)
            .collect()
    }

    /// Whether the user expressed `intent` recently.
    #[must_use]
    pub fn has_user_intent(&self, intent: &str) -> bool {
        self.has_user_intent_within(intent, self.lookup_recency)
    }

    /// Whether the user expressed `intent` within `age_limit`.
    #[must_use]
    pub fn has_user_intent_within(&self, intent: &str, age_limit: impl Into<AgeLimit>) -> bool {
        self.history.has_user_intent(intent, age_limit.into())
    }

    /// Whether the bot said something for `intent` recently.
    #[must_use]
    pub fn has_outgoing_intent(&self, intent: &str) -> bool {
        self.has_outgoing_intent_within(intent, self.lookup_recency)
    }

    /// Whether the bot said something for `intent` within `age_limit`.
    #[must_use]
    pub fn has_outgoing_intent_within(&self, intent: &str, age_limit: impl Into<AgeLimit>) -> bool {
        self.history.has_outgoing_intent(intent, age_limit.into())
    }

    /// Persists an answer and moves on to the next open question.
    ///
    /// # Errors
    ///
    /// Returns `UnknownQuestion` for ids outside the questionnaires, or the
    /// answer store's error.
    pub fn add_answer_to_question(
        &mut self,
        question_id: &str,
        answer: &str,
    ) -> Result<(), ContextError> {
        if self.questionnaires.question(question_id).is_none() {
            return Err(ContextError::UnknownQuestion {
                id: question_id.to_string(),
            });
        }
        self.answers.add_answer(self.user.id, question_id, answer)?;
        self.answered.insert(question_id.to_string());
        self.update_question_context();
        Ok(())
    }

    fn update_question_context(&mut self) {
        self.position = self
            .questionnaires
            .next_unanswered(&self.answered)
            .map(|(questionnaire, question)| Position {
                questionnaire,
                question: question.id().to_string(),
            });
        if self.position.is_none() {
            tracing::debug!(user_id = %self.user.id, "all questionnaires answered");
        }
    }

    /// The first unanswered question, if any remain.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let position = self.position.as_ref()?;
        self.questionnaires.question(&position.question)
    }

    /// The questionnaire the current question belongs to.
    #[must_use]
    pub fn current_questionnaire(&self) -> Option<&Questionnaire> {
        let position = self.position.as_ref()?;
        self.questionnaires.questionnaires().get(position.questionnaire)
    }

    /// The questionnaires this context walks through.
    #[must_use]
    pub fn questionnaires(&self) -> &dyn QuestionnaireProvider {
        self.questionnaires.as_ref()
    }

    /// Whether every question has an answer.
    #[must_use]
    pub fn claim_finished(&self) -> bool {
        self.position.is_none()
    }

    /// Whether any question has been answered.
    #[must_use]
    pub fn has_answered_questions(&self) -> bool {
        !self.answered.is_empty()
    }

    /// Ids of the answered questions.
    #[must_use]
    pub fn answered_ids(&self) -> &BTreeSet<String> {
        &self.answered
    }

    /// The answers given so far.
    ///
    /// # Errors
    ///
    /// Returns the answer store's error.
    pub fn answers(&self) -> Result<std::collections::BTreeMap<String, String>, ContextError> {
        Ok(self.answers.answers(self.user.id)?)
    }

    /// Completion of the current questionnaire, `1.0` once all are done.
    #[must_use]
    pub fn questionnaire_completion_ratio(&self) -> f64 {
        self.current_questionnaire()
            .map_or(1.0, |q| q.completion_ratio(&self.answered))
    }

    /// Completion over all questionnaires, each weighted equally.
    #[must_use]
    pub fn overall_completion_ratio(&self) -> f64 {
        let Some(position) = &self.position else {
            return 1.0;
        };
        let total = self.questionnaires.questionnaires().len() as f64;
        (position.questionnaire as f64 + self.questionnaire_completion_ratio()) / total
    }

    /// A stored value.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// A stored value deserialized into `T`; `None` if absent or of another shape.
    #[must_use]
    pub fn value_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether a stored value is present and truthy.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(is_truthy)
    }

    /// Stores a value.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Removes a stored value.
    pub fn remove_value(&mut self, key: &str) -> Option<JsonValue> {
        self.values.remove(key)
    }

    /// Forgets the conversation and all answers of this user.
    ///
    /// # Errors
    ///
    /// Returns the answer store's error.
    pub fn reset(&mut self) -> Result<(), ContextError> {
        self.answers.clear_answers(self.user.id)?;
        self.answered.clear();
        self.values.clear();
        self.history.clear();
        self.dialog_states.reset(self.floor.clone());
        self.update_question_context();
        tracing::info!(user_id = %self.user.id, "context reset");
        Ok(())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("user", &self.user)
            .field("dialog_states", &self.dialog_states)
            .field("history_len", &self.history.len())
            .field("answered", &self.answered)
            .field("values", &self.values)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
