//! Turn planning.
//!
//! One turn runs in three phases over the latest user utterance:
//!
//! 1. Every matching stateless handler, in declaration order.
//! 2. The first matching handler of the highest-priority dialog state that
//!    has one.
//! 3. Otherwise the first matching fallback, or the no-rule policy.
//!
//! A handler returning [`Outcome::Reevaluate`] discards the turn's output
//! and restarts the turn once. [`Outcome::Stop`] ends it with whatever has
//! been composed.

use crate::composer::{ResponseComposer, render_question, render_questionnaire};
use crate::config::{DialogConfig, NoRulePolicy};
use crate::error::{HandlerError, TurnError};
use crate::handler::{Handler, Outcome};
use crate::router::Router;
use parlance_conversation::{Context, MessageUnderstanding, State, Utterance};
use parlance_templates::{RecentIntents, SelectiveTemplateLoader, TemplateEnvironment, TemplateProvider};
use rootcause::prelude::Report;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Context value holding the least-recently-used template counters.
pub const TEMPLATE_USAGE_KEY: &str = "template_usage";

/// Name reported for failures of the no-rule apology.
const NO_RULE_HANDLER: &str = "no_rule_found";

enum Pass {
    Finished(ResponseComposer),
    Reevaluate,
}

/// Decides what the bot says next.
pub struct PlanningAgent {
    router: Arc<Router>,
    templates: Arc<dyn TemplateProvider>,
    config: DialogConfig,
}

impl PlanningAgent {
    /// Creates an agent over a router and template provider.
    #[must_use]
    pub fn new(router: Arc<Router>, templates: Arc<dyn TemplateProvider>, config: DialogConfig) -> Self {
        Self {
            router,
            templates,
            config,
        }
    }

    /// The rules the agent routes by.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The dialog settings.
    #[must_use]
    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    /// The variables and recency functions templates see for this context.
    #[must_use]
    pub fn environment_for(&self, context: &Context) -> TemplateEnvironment {
        let mut recent = RecentIntents::new();
        for utterance in context.history().iter() {
            match utterance {
                Utterance::User(understanding) => recent.push_user(understanding.intent()),
                Utterance::Bot(action) => recent.push_bot(action.intents()),
            }
        }
        let user = context.user();
        let mut environment = TemplateEnvironment::new()
            .with_formal_address(user.formal_address)
            .with_recent_intents(recent)
            .with_recency(self.config.lookup_recency)
            .with_variable("questionnaire_completion", context.questionnaire_completion_ratio())
            .with_variable("overall_completion", context.overall_completion_ratio())
            .with_variable("claim_finished", context.claim_finished())
            .with_variable("has_answered_questions", context.has_answered_questions())
            .with_variable(
                "user",
                json!({
                    "first_name": user.first_name,
                    "formal_address": user.formal_address,
                    "is_admin": user.is_admin,
                }),
            );

        let question = context.current_question().map_or(Ok(JsonValue::Null), |q| {
            render_question(q, &environment).map_err(|e| (q.id().to_string(), e))
        });
        let questionnaire = context.current_questionnaire().map_or(Ok(JsonValue::Null), |q| {
            render_questionnaire(q, &environment).map_err(|e| (q.id().to_string(), e))
        });
        for (name, value) in [("question", question), ("questionnaire", questionnaire)] {
            match value {
                Ok(value) => environment.set_variable(name, value),
                Err((id, error)) => {
                    error!(variable = name, id = %id, error = %error, "Failed to render template variable");
                    environment.set_variable(name, JsonValue::Null);
                }
            }
        }
        environment
    }

    /// A fresh composer for one pass over the turn.
    #[must_use]
    pub fn composer_for(&self, context: &Context) -> ResponseComposer {
        let usage: HashMap<String, u64> = context.value_as(TEMPLATE_USAGE_KEY).unwrap_or_default();
        let loader = SelectiveTemplateLoader::new(
            Arc::clone(&self.templates),
            self.config.template_selection.selector(usage),
            self.environment_for(context),
        );
        ResponseComposer::new(context.user().id, loader)
    }

    /// Plans the reply to the latest user utterance of `context`.
    ///
    /// # Errors
    ///
    /// Returns `MissingUtterance` when the context has no user utterance,
    /// `HandlerFailed` when a callback fails and `InvalidTransition` when a
    /// callback returns a transition the dialog states reject.
    pub fn build_next_actions(
        &self,
        context: &mut Context,
    ) -> Result<ResponseComposer, Report<TurnError>> {
        let understanding = context
            .last_user_utterance()
            .cloned()
            .ok_or_else(|| TurnError::MissingUtterance {
                user: context.user().id.to_string(),
            })?;

        let mut allow_reevaluate = true;
        let composer = loop {
            match self.run_turn(context, &understanding, allow_reevaluate)? {
                Pass::Finished(composer) => break composer,
                Pass::Reevaluate => {
                    debug!(user_id = %context.user().id, "Re-evaluating turn");
                    allow_reevaluate = false;
                }
            }
        };

        if let Some(usage) = composer.loader().selector().usage() {
            let counters = usage
                .iter()
                .map(|(text, count)| (text.clone(), JsonValue::from(*count)))
                .collect();
            context.set_value(TEMPLATE_USAGE_KEY, JsonValue::Object(counters));
        }
        Ok(composer)
    }

    fn run_turn(
        &self,
        context: &mut Context,
        understanding: &MessageUnderstanding,
        allow_reevaluate: bool,
    ) -> Result<Pass, TurnError> {
        let mut composer = self.composer_for(context);

        for handler in self.router.iter_stateless_matches(understanding) {
            debug!(handler = handler.name(), intent = understanding.intent(), "Running stateless handler");
            match invoke(handler, &mut composer, context)? {
                Outcome::Reevaluate if allow_reevaluate => return Ok(Pass::Reevaluate),
                Outcome::Reevaluate => {
                    warn!(handler = handler.name(), "Ignoring re-evaluation requested during a re-evaluated turn");
                }
                Outcome::Stop => return Ok(Pass::Finished(composer)),
                other => debug!(handler = handler.name(), outcome = ?other, "Ignoring stateless outcome"),
            }
        }

        let Some(handler) = self.find_handler(context, understanding) else {
            warn!(
                user_id = %context.user().id,
                intent = understanding.intent(),
                states = %context.dialog_states(),
                "No matching rule found"
            );
            if self.config.no_rule_policy == NoRulePolicy::Apologize {
                composer
                    .say_or_literal("sorry")
                    .and_then(|c| c.say_or_literal("did not understand"))
                    .map_err(|e| TurnError::HandlerFailed {
                        handler: NO_RULE_HANDLER.to_string(),
                        reason: e.to_string(),
                    })?;
            }
            return Ok(Pass::Finished(composer));
        };

        match invoke(handler, &mut composer, context)? {
            Outcome::Stay | Outcome::Stop => {}
            Outcome::Transition(transition) => {
                debug!(handler = handler.name(), state = %transition.state, "Entering state");
                context
                    .dialog_states_mut()
                    .put(transition)
                    .map_err(|e| TurnError::InvalidTransition {
                        handler: handler.name().to_string(),
                        reason: e.to_string(),
                    })?;
            }
            Outcome::Reevaluate if allow_reevaluate => return Ok(Pass::Reevaluate),
            Outcome::Reevaluate => {
                warn!(handler = handler.name(), "Ignoring re-evaluation requested during a re-evaluated turn");
            }
        }
        Ok(Pass::Finished(composer))
    }

    fn find_handler(&self, context: &Context, understanding: &MessageUnderstanding) -> Option<&Handler> {
        let states: Vec<State> = context.dialog_states().iter_states().cloned().collect();
        states
            .iter()
            .find_map(|state| self.router.find_matching_state_handler(state, understanding))
            .or_else(|| {
                debug!(intent = understanding.intent(), "No state handler matched, trying fallbacks");
                self.router.get_fallback_handler(understanding)
            })
    }
}

fn invoke(handler: &Handler, composer: &mut ResponseComposer, context: &mut Context) -> Result<Outcome, TurnError> {
    handler
        .invoke(composer, context)
        .map_err(|e: HandlerError| TurnError::HandlerFailed {
            handler: handler.name().to_string(),
            reason: e.to_string(),
        })
}
