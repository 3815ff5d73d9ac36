//! Outgoing message units.

use chrono::{DateTime, Utc};
use parlance_core::{UserId, normalize_intent};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

static HTML_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\s+href\s*=\s*['"]([^'"]*)['"][^>]*>(.*?)<\s*/\s*a\s*>"#)
        .expect("link pattern is valid")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*/?\s*[a-zA-Z][^>]*>").expect("tag pattern is valid"));

/// What kind of message an action is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// A plain statement.
    Saying,
    /// A question awaiting the user's answer.
    AskingQuestion,
    /// A picture, sticker or other media file.
    SendingMedia,
}

/// Fixed pause tiers used to pace consecutive messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delay {
    /// 1.3 seconds.
    Short,
    /// 1.6 seconds.
    Medium,
    /// 1.9 seconds.
    Long,
    /// 3 seconds.
    VeryLong,
}

impl Delay {
    /// The pause length.
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Self::Short => Duration::from_millis(1300),
            Self::Medium => Duration::from_millis(1600),
            Self::Long => Duration::from_millis(1900),
            Self::VeryLong => Duration::from_millis(3000),
        }
    }
}

impl From<Delay> for Duration {
    fn from(delay: Delay) -> Self {
        delay.duration()
    }
}

/// One outgoing message.
///
/// Built up by the response composer; the final text is the concatenation of
/// `text_parts`. `intents` lists every intent that contributed a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAction {
    action_type: ActionType,
    peer: UserId,
    text_parts: Vec<String>,
    intents: Vec<String>,
    choices: Option<Vec<String>>,
    media_id: Option<String>,
    delay: Option<Duration>,
    show_typing: bool,
    date: DateTime<Utc>,
}

impl ChatAction {
    /// Creates an empty action of the given type.
    #[must_use]
    pub fn new(action_type: ActionType, peer: UserId) -> Self {
        Self {
            action_type,
            peer,
            text_parts: Vec::new(),
            intents: Vec::new(),
            choices: None,
            media_id: None,
            delay: None,
            show_typing: true,
            date: Utc::now(),
        }
    }

    /// Adds the first text fragment.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_parts.push(text.into());
        self
    }

    /// Adds a contributing intent.
    #[must_use]
    pub fn with_intent(mut self, intent: &str) -> Self {
        self.add_intent(intent);
        self
    }

    /// Attaches quick-reply choices.
    #[must_use]
    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.set_choices(choices);
        self
    }

    /// Attaches a media file.
    #[must_use]
    pub fn with_media(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = Some(media_id.into());
        self
    }

    /// Sets an explicit delay before sending.
    #[must_use]
    pub fn with_delay(mut self, delay: impl Into<Duration>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    /// Disables the typing indicator.
    #[must_use]
    pub fn without_typing(mut self) -> Self {
        self.show_typing = false;
        self
    }

    /// The kind of message.
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    /// Changes the kind of message, e.g. when a question is appended.
    pub fn set_action_type(&mut self, action_type: ActionType) {
        self.action_type = action_type;
    }

    /// The recipient.
    #[must_use]
    pub fn peer(&self) -> UserId {
        self.peer
    }

    /// The text fragments in order.
    #[must_use]
    pub fn text_parts(&self) -> &[String] {
        &self.text_parts
    }

    /// Appends a text fragment.
    pub fn push_text(&mut self, part: impl Into<String>) {
        self.text_parts.push(part.into());
    }

    /// The last non-empty text fragment, for punctuation fix-ups.
    pub fn last_text_mut(&mut self) -> Option<&mut String> {
        self.text_parts.iter_mut().rev().find(|part| !part.is_empty())
    }

    /// The contributing intents.
    #[must_use]
    pub fn intents(&self) -> &[String] {
        &self.intents
    }

    /// Records a contributing intent.
    pub fn add_intent(&mut self, intent: &str) {
        self.intents.push(normalize_intent(intent));
    }

    /// Whether the intent contributed to this action.
    #[must_use]
    pub fn has_intent(&self, intent: &str) -> bool {
        let intent = normalize_intent(intent);
        self.intents.iter().any(|i| *i == intent)
    }

    /// Quick-reply options, if any.
    #[must_use]
    pub fn choices(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    /// Replaces the quick-reply options.
    pub fn set_choices(&mut self, choices: Vec<String>) {
        self.choices = Some(choices);
    }

    /// The attached media file, if any.
    #[must_use]
    pub fn media_id(&self) -> Option<&str> {
        self.media_id.as_deref()
    }

    /// The pause before sending, once computed.
    #[must_use]
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Sets the pause before sending.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Some(delay);
    }

    /// Whether the client should show a typing indicator during the delay.
    #[must_use]
    pub fn show_typing(&self) -> bool {
        self.show_typing
    }

    /// When the action was created.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// The message text as sent.
    #[must_use]
    pub fn render(&self) -> String {
        self.text_parts.concat()
    }

    /// The message text without markup. Links become `text (url)`.
    #[must_use]
    pub fn render_plain(&self) -> String {
        let text = self.render();
        let text = HTML_LINK.replace_all(&text, "$2 ($1)");
        HTML_TAG.replace_all(&text, "").into_owned()
    }
}

impl fmt::Display for ChatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action_type {
            ActionType::Saying => "say",
            ActionType::AskingQuestion => "ask",
            ActionType::SendingMedia => "send",
        };
        write!(f, "{verb} {:?}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(text: &str) -> ChatAction {
        ChatAction::new(ActionType::Saying, UserId::new()).with_text(text)
    }

    #[test]
    fn links_keep_their_target() {
        let a = action("<a href='http://google.com'> Stripped away< /a>");
        assert_eq!(a.render_plain(), " Stripped away (http://google.com)");
    }

    #[test]
    fn other_tags_are_removed() {
        assert_eq!(action("<i> Hi < /i>").render_plain(), " Hi ");
        assert_eq!(action("<b>bold</b> text").render_plain(), "bold text");
    }

    #[test]
    fn render_concatenates_parts() {
        let mut a = action("Hallo");
        a.push_text(".");
        a.push_text(" Wie geht's?");
        assert_eq!(a.render(), "Hallo. Wie geht's?");
    }

    #[test]
    fn last_text_skips_empty_separators() {
        let mut a = action("Hallo");
        a.push_text("");
        if let Some(last) = a.last_text_mut() {
            last.push('!');
        }
        assert_eq!(a.render(), "Hallo!");
    }

    #[test]
    fn intents_are_normalized() {
        let a = action("x").with_intent("What I can do");
        assert!(a.has_intent("what_i_can_do"));
        assert!(a.has_intent("what i can do"));
    }

    #[test]
    fn delay_tiers() {
        assert_eq!(Delay::Short.duration(), Duration::from_millis(1300));
        assert_eq!(Delay::VeryLong.duration(), Duration::from_secs(3));
        let a = action("x").with_delay(Delay::Medium);
        assert_eq!(a.delay(), Some(Duration::from_millis(1600)));
    }

    #[test]
    fn display_names_the_verb() {
        let q = ChatAction::new(ActionType::AskingQuestion, UserId::new()).with_text("Ok?");
        assert_eq!(q.to_string(), "ask \"Ok?\"");
    }
}
