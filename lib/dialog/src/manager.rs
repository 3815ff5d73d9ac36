//! Transport-facing side of the engine.
//!
//! The [`DialogManager`] turns chat updates into understandings, runs one
//! turn per update under the user's context lock and hands the resulting
//! actions to a [`BotClient`].

use crate::agent::PlanningAgent;
use crate::error::{ClientError, TurnError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parlance_conversation::{
    AnswerStore, ChatAction, Context, ContextError, DEFAULT_LOOKUP_RECENCY, MessageUnderstanding,
    QuestionnaireProvider, START_INTENT, State,
};
use parlance_core::{UpdateId, User, UserId};
use rootcause::prelude::Report;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Delivers actions to the user.
#[async_trait]
pub trait BotClient: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Sends the actions in order, honoring their delays.
    async fn perform_actions(&self, actions: &[ChatAction]) -> Result<(), ClientError>;
}

/// Interprets free text.
#[async_trait]
pub trait NluClient: Send + Sync {
    async fn understand(&self, text: &str, user: &User) -> Result<MessageUnderstanding, ClientError>;
}

/// What arrived from the chat.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// The user opened the conversation.
    Start,
    /// A text message.
    Text(String),
    /// A photo or other file, by location.
    Media { location: String },
}

/// One incoming chat update.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub id: UpdateId,
    pub user: User,
    pub kind: UpdateKind,
    pub date: DateTime<Utc>,
}

impl Update {
    #[must_use]
    pub fn new(user: User, kind: UpdateKind) -> Self {
        Self {
            id: UpdateId::new(),
            user,
            kind,
            date: Utc::now(),
        }
    }

    #[must_use]
    pub fn start(user: User) -> Self {
        Self::new(user, UpdateKind::Start)
    }

    #[must_use]
    pub fn text(user: User, text: impl Into<String>) -> Self {
        Self::new(user, UpdateKind::Text(text.into()))
    }

    #[must_use]
    pub fn media(user: User, location: impl Into<String>) -> Self {
        Self::new(user, UpdateKind::Media {
            location: location.into(),
        })
    }
}

/// Owns exactly one context per user.
///
/// Each context sits behind its own async mutex, so turns of one user are
/// serialized while different users proceed concurrently.
pub struct ContextManager {
    contexts: DashMap<UserId, Arc<Mutex<Context>>>,
    questionnaires: Arc<dyn QuestionnaireProvider>,
    answers: Arc<dyn AnswerStore>,
    floor: State,
    lookup_recency: usize,
}

impl ContextManager {
    #[must_use]
    pub fn new(
        questionnaires: Arc<dyn QuestionnaireProvider>,
        answers: Arc<dyn AnswerStore>,
        floor: impl Into<State>,
    ) -> Self {
        Self {
            contexts: DashMap::new(),
            questionnaires,
            answers,
            floor: floor.into(),
            lookup_recency: DEFAULT_LOOKUP_RECENCY,
        }
    }

    #[must_use]
    pub fn with_lookup_recency(mut self, recency: usize) -> Self {
        self.lookup_recency = recency;
        self
    }

    /// The user's context, created on first contact.
    ///
    /// # Errors
    ///
    /// Returns the answer store's error if a new context cannot load the
    /// user's answers.
    pub fn get_or_create(&self, user: &User) -> Result<Arc<Mutex<Context>>, ContextError> {
        if let Some(context) = self.contexts.get(&user.id) {
            return Ok(Arc::clone(context.value()));
        }
        let context = Context::new(
            user.clone(),
            self.floor.clone(),
            Arc::clone(&self.questionnaires),
            Arc::clone(&self.answers),
        )?
        .with_lookup_recency(self.lookup_recency);
        let entry = self
            .contexts
            .entry(user.id)
            .or_insert_with(|| {
                info!(user_id = %user.id, "Created context");
                Arc::new(Mutex::new(context))
            });
        Ok(Arc::clone(entry.value()))
    }

    /// The user's context, if one exists.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<Arc<Mutex<Context>>> {
        self.contexts.get(&user_id).map(|c| Arc::clone(c.value()))
    }

    /// Forgets the user's conversation and answers. Returns whether a
    /// context existed.
    ///
    /// # Errors
    ///
    /// Returns the answer store's error.
    pub async fn reset(&self, user_id: UserId) -> Result<bool, ContextError> {
        let Some(context) = self.get(user_id) else {
            return Ok(false);
        };
        context.lock().await.reset()?;
        Ok(true)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Runs turns for incoming updates.
pub struct DialogManager {
    agent: PlanningAgent,
    contexts: Arc<ContextManager>,
    bot: Arc<dyn BotClient>,
    nlu: Arc<dyn NluClient>,
}

impl DialogManager {
    #[must_use]
    pub fn new(
        agent: PlanningAgent,
        contexts: Arc<ContextManager>,
        bot: Arc<dyn BotClient>,
        nlu: Arc<dyn NluClient>,
    ) -> Self {
        Self {
            agent,
            contexts,
            bot,
            nlu,
        }
    }

    #[must_use]
    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    #[must_use]
    pub fn agent(&self) -> &PlanningAgent {
        &self.agent
    }

    /// Interprets an update.
    ///
    /// # Errors
    ///
    /// Returns `UnderstandingFailed` when the NLU client fails.
    pub async fn understand(&self, update: &Update) -> Result<MessageUnderstanding, Report<TurnError>> {
        let understanding = match &update.kind {
            UpdateKind::Start => MessageUnderstanding::synthetic(START_INTENT),
            UpdateKind::Media { location } => MessageUnderstanding::media(location.clone()),
            UpdateKind::Text(text) => self
                .nlu
                .understand(text, &update.user)
                .await
                .map_err(|e| TurnError::UnderstandingFailed {
                    user: update.user.id.to_string(),
                    reason: e.to_string(),
                })?,
        };
        Ok(understanding.with_date(update.date))
    }

    /// Handles one update end to end and returns the actions sent.
    ///
    /// A failing bot client is logged and does not fail the turn; the
    /// actions are recorded either way.
    ///
    /// # Errors
    ///
    /// Returns understanding, context and planning failures.
    pub async fn handle_update(&self, update: Update) -> Result<Vec<ChatAction>, Report<TurnError>> {
        let understanding = self.understand(&update).await?;
        debug!(
            user_id = %update.user.id,
            update_id = %update.id,
            intent = understanding.intent(),
            "Handling update"
        );

        let context = self
            .contexts
            .get_or_create(&update.user)
            .map_err(|e| TurnError::ContextUnavailable {
                user: update.user.id.to_string(),
                reason: e.to_string(),
            })?;
        let mut context = context.lock().await;
        context.add_user_utterance(understanding);

        let composer = self.agent.build_next_actions(&mut context)?;
        let actions = composer.collect_actions(&self.agent.config().pacing);

        if let Err(e) = self.bot.perform_actions(&actions).await {
            warn!(
                user_id = %update.user.id,
                client = self.bot.name(),
                error = %e,
                "Sending actions failed"
            );
        }
        context.add_actions(actions.iter().cloned());
        Ok(actions)
    }
}
