//! What the NLU made of an incoming message.

use chrono::{DateTime, Utc};
use parlance_core::{is_truthy, normalize_intent};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Intent of the synthetic understanding produced for a start command.
pub const START_INTENT: &str = "start";

/// Intent of the synthetic understanding produced for media uploads.
pub const MEDIA_INTENT: &str = "media";

/// An interpreted user utterance.
///
/// Immutable once built. The NLU collaborator produces these for text; the
/// transport layer builds synthetic ones for system events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageUnderstanding {
    text: Option<String>,
    intent: String,
    parameters: BTreeMap<String, JsonValue>,
    contexts: Vec<String>,
    score: Option<f64>,
    date: DateTime<Utc>,
    media_location: Option<String>,
}

impl MessageUnderstanding {
    /// Creates an understanding of a text message.
    #[must_use]
    pub fn new(text: impl Into<String>, intent: &str) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::synthetic(intent)
        }
    }

    /// Creates an understanding with no user text, e.g. for `/start`.
    #[must_use]
    pub fn synthetic(intent: &str) -> Self {
        Self {
            text: None,
            intent: normalize_intent(intent),
            parameters: BTreeMap::new(),
            contexts: Vec::new(),
            score: None,
            date: Utc::now(),
            media_location: None,
        }
    }

    /// Creates the understanding of an uploaded media file.
    #[must_use]
    pub fn media(location: impl Into<String>) -> Self {
        Self {
            media_location: Some(location.into()),
            ..Self::synthetic(MEDIA_INTENT)
        }
    }

    /// Adds an extracted parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Adds an NLU context name.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.push(context.into());
        self
    }

    /// Sets the NLU confidence.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// The raw text, absent for synthetic events.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The normalized intent.
    #[must_use]
    pub fn intent(&self) -> &str {
        &self.intent
    }

    /// All extracted parameters.
    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, JsonValue> {
        &self.parameters
    }

    /// A single parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&JsonValue> {
        self.parameters.get(name)
    }

    /// A string parameter by name.
    #[must_use]
    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(JsonValue::as_str)
    }

    /// Whether a parameter is present with a non-empty value.
    #[must_use]
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some_and(is_truthy)
    }

    /// NLU context names.
    #[must_use]
    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    /// NLU confidence, if reported.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// When the message was received.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Where the uploaded media can be fetched.
    #[must_use]
    pub fn media_location(&self) -> Option<&str> {
        self.media_location.as_deref()
    }

    /// Whether this understanding stands for a media upload.
    #[must_use]
    pub fn is_media(&self) -> bool {
        self.intent == MEDIA_INTENT
    }
}
