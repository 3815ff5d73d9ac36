//! Bounded utterance history, newest first.

use crate::action::ChatAction;
use crate::understanding::MessageUnderstanding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of utterances a history keeps.
pub const HISTORY_LIMIT: usize = 50;

/// Default number of same-kind utterances recency lookups inspect.
pub const DEFAULT_LOOKUP_RECENCY: usize = 15;

/// Either side of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum Utterance {
    /// Something the user said.
    User(MessageUnderstanding),
    /// Something the bot sent.
    Bot(ChatAction),
}

impl Utterance {
    /// When the utterance happened.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Self::User(u) => u.date(),
            Self::Bot(a) => a.date(),
        }
    }

    /// The user side, if this is one.
    #[must_use]
    pub fn as_user(&self) -> Option<&MessageUnderstanding> {
        match self {
            Self::User(u) => Some(u),
            Self::Bot(_) => None,
        }
    }

    /// The bot side, if this is one.
    #[must_use]
    pub fn as_bot(&self) -> Option<&ChatAction> {
        match self {
            Self::Bot(a) => Some(a),
            Self::User(_) => None,
        }
    }

    fn kind(&self) -> UtteranceKind {
        match self {
            Self::User(_) => UtteranceKind::User,
            Self::Bot(_) => UtteranceKind::Bot,
        }
    }
}

/// Which side of the conversation a lookup inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceKind {
    /// Incoming understandings.
    User,
    /// Outgoing actions.
    Bot,
}

/// How far back a lookup may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeLimit {
    /// At most this many utterances of the inspected kind after the newest one.
    Count(usize),
    /// Only utterances at or after this instant.
    Since(DateTime<Utc>),
    /// Only utterances younger than this.
    Within(chrono::Duration),
}

impl Default for AgeLimit {
    fn default() -> Self {
        Self::Count(DEFAULT_LOOKUP_RECENCY)
    }
}

impl From<usize> for AgeLimit {
    fn from(count: usize) -> Self {
        Self::Count(count)
    }
}

impl From<chrono::Duration> for AgeLimit {
    fn from(duration: chrono::Duration) -> Self {
        Self::Within(duration)
    }
}

impl From<DateTime<Utc>> for AgeLimit {
    fn from(since: DateTime<Utc>) -> Self {
        Self::Since(since)
    }
}

/// Interleaved user and bot utterances, capped at [`HISTORY_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    items: VecDeque<Utterance>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an utterance to the front, dropping the oldest beyond the cap.
    pub fn push(&mut self, utterance: Utterance) {
        self.items.push_front(utterance);
        self.items.truncate(HISTORY_LIMIT);
    }

    /// Iterates newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Utterance> {
        self.items.iter()
    }

    /// The newest user utterance.
    #[must_use]
    pub fn last_user_utterance(&self) -> Option<&MessageUnderstanding> {
        self.items.iter().find_map(Utterance::as_user)
    }

    /// The newest bot action.
    #[must_use]
    pub fn last_bot_action(&self) -> Option<&ChatAction> {
        self.items.iter().find_map(Utterance::as_bot)
    }

    /// Scans newest to oldest for utterances of `kind` accepted by `predicate`.
    ///
    /// Utterances of the other kind are skipped and do not count towards a
    /// [`AgeLimit::Count`]. A count limit stops the scan once exceeded; a time
    /// limit skips the utterances that are too old. With `only_latest` the scan
    /// stops at the first hit.
    pub fn filter<F>(
        &self,
        kind: UtteranceKind,
        predicate: F,
        age_limit: AgeLimit,
        only_latest: bool,
    ) -> Vec<&Utterance>
    where
        F: Fn(&Utterance) -> bool,
    {
        let horizon = match age_limit {
            AgeLimit::Since(since) => Some(since),
            AgeLimit::Within(duration) => Some(Utc::now() - duration),
            AgeLimit::Count(_) => None,
        };

        let mut results = Vec::new();
        let same_kind = self.items.iter().filter(|u| u.kind() == kind);
        for (age, utterance) in same_kind.enumerate() {
            if let AgeLimit::Count(limit) = age_limit
                && age > limit
            {
                break;
            }
            if let Some(horizon) = horizon
                && utterance.date() < horizon
            {
                continue;
            }
            if predicate(utterance) {
                results.push(utterance);
                if only_latest {
                    break;
                }
            }
        }
        results
    }

    /// Whether the user expressed `intent` within the age limit.
    #[must_use]
    pub fn has_user_intent(&self, intent: &str, age_limit: AgeLimit) -> bool {
        let intent = parlance_core::normalize_intent(intent);
        !self
            .filter(
                UtteranceKind::User,
                |u| u.as_user().is_some_and(|u| u.intent() == intent),
                age_limit,
                true,
            )
            .is_empty()
    }

    /// Whether the bot sent something for `intent` within the age limit.
    #[must_use]
    pub fn has_outgoing_intent(&self, intent: &str, age_limit: AgeLimit) -> bool {
        !self
            .filter(
                UtteranceKind::Bot,
                |u| u.as_bot().is_some_and(|a| a.has_intent(intent)),
                age_limit,
                true,
            )
            .is_empty()
    }

    /// Number of stored utterances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
