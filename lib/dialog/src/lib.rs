//! Rule-based dialog engine for parlance.
//!
//! This crate provides:
//!
//! - **Handlers**: triggers over understandings paired with callbacks
//! - **Router**: stateless, per-state and fallback rule lookup
//! - **ResponseComposer**: assembles template fragments into chat actions
//! - **PlanningAgent**: runs one turn against a user's context
//! - **DialogManager**: ties updates, contexts and the bot client together

pub mod agent;
pub mod composer;
pub mod config;
pub mod emoji;
pub mod error;
pub mod handler;
pub mod manager;
pub mod router;

pub use agent::{PlanningAgent, TEMPLATE_USAGE_KEY};
pub use composer::{Parameters, ResponseComposer, render_question, render_questionnaire};
pub use config::{DialogConfig, NoRulePolicy, PacingConfig, SelectionStrategy};
pub use emoji::{Sentiment, SentimentScore};
pub use error::{ClientError, ComposeError, HandlerError, TurnError};
pub use handler::{AFFIRMATIONS, Callback, DEFAULT_EMOJI_THRESHOLD, Handler, NEGATIONS, Outcome, Trigger};
pub use manager::{BotClient, ContextManager, DialogManager, NluClient, Update, UpdateKind};
pub use router::{Router, RuleTable};
