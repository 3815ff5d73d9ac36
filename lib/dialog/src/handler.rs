//! Rule handlers: a trigger over the incoming understanding plus a callback.

use crate::composer::ResponseComposer;
use crate::emoji::{self, Sentiment};
use crate::error::HandlerError;
use parlance_conversation::{Context, MEDIA_INTENT, MessageUnderstanding, State, Transition};
use parlance_core::{is_truthy, normalize_intent};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Intents and parameters that count as "yes".
pub const AFFIRMATIONS: &[&str] = &[
    "yes",
    "correct",
    "smalltalk.dialog.correct",
    "smalltalk.agent.right",
];

/// Intents and parameters that count as "no".
pub const NEGATIONS: &[&str] = &[
    "no",
    "wrong",
    "smalltalk.dialog.wrong",
    "skip",
    "smalltalk.agent.wrong",
];

/// Default share an emoji sentiment needs to trigger.
pub const DEFAULT_EMOJI_THRESHOLD: f64 = 0.5;

/// What a callback asks the agent to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Keep the dialog states as they are.
    Stay,
    /// Push a new dialog state.
    Transition(Transition),
    /// Discard this turn's output and run the turn again.
    Reevaluate,
    /// End the turn with what has been composed so far.
    Stop,
}

impl Outcome {
    /// Transition into `state` for good.
    #[must_use]
    pub fn to(state: impl Into<State>) -> Self {
        Self::Transition(Transition::to(state))
    }

    /// Transition into `state` for `turns` turns.
    #[must_use]
    pub fn for_turns(state: impl Into<State>, turns: u32) -> Self {
        Self::Transition(Transition::for_turns(state, turns))
    }
}

impl From<Transition> for Outcome {
    fn from(transition: Transition) -> Self {
        Self::Transition(transition)
    }
}

/// Handler callback.
pub type Callback =
    dyn Fn(&mut ResponseComposer, &mut Context) -> Result<Outcome, HandlerError> + Send + Sync;

/// When a handler applies.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// The intent starts with one of `prefixes` (any intent when `None`) and
    /// every listed parameter is present and non-empty.
    Intents {
        prefixes: Option<Vec<String>>,
        parameters: Vec<String>,
    },
    /// The message text matches a pattern.
    Regex(Regex),
    /// Yes, in any of its forms.
    Affirmation,
    /// No, in any of its forms.
    Negation,
    /// A photo or file.
    Media,
    /// A message of only emoji, optionally with a dominant sentiment.
    Emoji {
        sentiment: Option<Sentiment>,
        threshold: f64,
    },
}

impl Trigger {
    /// Intents starting with any of the prefixes.
    #[must_use]
    pub fn intents<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Intents {
            prefixes: Some(
                prefixes
                    .into_iter()
                    .map(|p| normalize_intent(p.as_ref()))
                    .collect(),
            ),
            parameters: Vec::new(),
        }
    }

    /// A single intent prefix.
    #[must_use]
    pub fn intent(prefix: &str) -> Self {
        Self::intents([prefix])
    }

    /// Any message.
    #[must_use]
    pub fn any_intent() -> Self {
        Self::Intents {
            prefixes: None,
            parameters: Vec::new(),
        }
    }

    /// Messages carrying all of the parameters, whatever their intent.
    #[must_use]
    pub fn parameters<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Intents {
            prefixes: None,
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Message text matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    /// Emoji-only messages of any sentiment.
    #[must_use]
    pub fn any_emoji() -> Self {
        Self::Emoji {
            sentiment: None,
            threshold: DEFAULT_EMOJI_THRESHOLD,
        }
    }

    /// Emoji-only messages whose `sentiment` share reaches the default threshold.
    #[must_use]
    pub fn emoji(sentiment: Sentiment) -> Self {
        Self::Emoji {
            sentiment: Some(sentiment),
            threshold: DEFAULT_EMOJI_THRESHOLD,
        }
    }

    /// Whether the trigger fires for any message.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        matches!(self, Self::Intents { prefixes: None, parameters } if parameters.is_empty())
    }

    /// Whether an intent-prefix trigger lists exactly this intent.
    #[must_use]
    pub fn contains_intent(&self, intent: &str) -> bool {
        let intent = normalize_intent(intent);
        matches!(self, Self::Intents { prefixes: Some(prefixes), .. } if prefixes.contains(&intent))
    }

    #[must_use]
    pub fn matches(&self, understanding: &MessageUnderstanding) -> bool {
        match self {
            Self::Intents {
                prefixes,
                parameters,
            } => {
                let intent = normalize_intent(understanding.intent());
                let intent_matches = prefixes
                    .as_ref()
                    .is_none_or(|prefixes| prefixes.iter().any(|p| intent.starts_with(p.as_str())));
                intent_matches && parameters.iter().all(|p| understanding.has_parameter(p))
            }
            Self::Regex(pattern) => understanding.text().is_some_and(|t| pattern.is_match(t)),
            Self::Affirmation => lexicon_matches(AFFIRMATIONS, understanding),
            Self::Negation => lexicon_matches(NEGATIONS, understanding),
            Self::Media => understanding.intent() == MEDIA_INTENT,
            Self::Emoji {
                sentiment,
                threshold,
            } => {
                let Some(found) = understanding.text().and_then(emoji::emoji_only) else {
                    return false;
                };
                match sentiment {
                    None => true,
                    Some(sentiment) => emoji::sentiment(&found)
                        .is_some_and(|score| score.share(*sentiment) >= *threshold),
                }
            }
        }
    }
}

fn lexicon_matches(lexicon: &[&str], understanding: &MessageUnderstanding) -> bool {
    let by_parameter = understanding
        .parameters()
        .iter()
        .any(|(name, value)| lexicon.contains(&name.as_str()) && is_truthy(value));
    by_parameter || lexicon.contains(&understanding.intent())
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intents {
                prefixes,
                parameters,
            } => {
                match prefixes {
                    Some(prefixes) => write!(f, "intents {prefixes:?}")?,
                    None => f.write_str("any intent")?,
                }
                if !parameters.is_empty() {
                    write!(f, " with {parameters:?}")?;
                }
                Ok(())
            }
            Self::Regex(pattern) => write!(f, "regex /{pattern}/"),
            Self::Affirmation => f.write_str("affirmation"),
            Self::Negation => f.write_str("negation"),
            Self::Media => f.write_str("media"),
            Self::Emoji {
                sentiment: None, ..
            } => f.write_str("any emoji"),
            Self::Emoji {
                sentiment: Some(sentiment),
                threshold,
            } => write!(f, "{sentiment:?} emoji >= {threshold}"),
        }
    }
}

/// A named trigger and callback.
#[derive(Clone)]
pub struct Handler {
    name: String,
    trigger: Trigger,
    callback: Arc<Callback>,
}

impl Handler {
    #[must_use]
    pub fn new<F>(name: impl Into<String>, trigger: Trigger, callback: F) -> Self
    where
        F: Fn(&mut ResponseComposer, &mut Context) -> Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            trigger,
            callback: Arc::new(callback),
        }
    }

    /// Same callback, different trigger.
    #[must_use]
    pub fn with_trigger(&self, trigger: Trigger) -> Self {
        Self {
            name: self.name.clone(),
            trigger,
            callback: Arc::clone(&self.callback),
        }
    }

    /// Wraps the callback, e.g. to count invocations before delegating.
    #[must_use]
    pub fn wrap<W>(self, wrapper: W) -> Self
    where
        W: Fn(&Callback, &mut ResponseComposer, &mut Context) -> Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let inner = self.callback;
        Self {
            name: self.name,
            trigger: self.trigger,
            callback: Arc::new(move |composer: &mut ResponseComposer, context: &mut Context| {
                wrapper(inner.as_ref(), composer, context)
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    #[must_use]
    pub fn matches(&self, understanding: &MessageUnderstanding) -> bool {
        self.trigger.matches(understanding)
    }

    /// Runs the callback.
    ///
    /// # Errors
    ///
    /// Returns whatever the callback returns.
    pub fn invoke(
        &self,
        composer: &mut ResponseComposer,
        context: &mut Context,
    ) -> Result<Outcome, HandlerError> {
        (self.callback)(composer, context)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.trigger, self.name)
    }
}
