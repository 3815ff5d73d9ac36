//! Assembles the outgoing messages of one turn.
//!
//! `say`/`ask` continue the current message, `then_say`/`then_ask` start a
//! new one. How a continuation joins the text before it depends on the
//! template's classification:
//!
//! | Classification | Join |
//! |---|---|
//! | plain | new sentence, or lower-cased continuation of an open one |
//! | prefix | new sentence that stays open |
//! | suffix | trailing lower-cased sentence, e.g. `"A. b"` |
//! | conjunction | lower-cased continuation of the open sentence |

use crate::config::PacingConfig;
use crate::emoji::ends_with_emoji;
use crate::error::ComposeError;
use parlance_conversation::{ActionType, ChatAction, Question, Questionnaire, Surrounding};
use parlance_core::{UserId, normalize_intent};
use parlance_templates::{
    Classification, Scope, SelectiveTemplateLoader, TemplateError, capitalize, decapitalize, render_str,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Template parameters of a single render.
pub type Parameters = BTreeMap<String, JsonValue>;

/// Template rendering a question inside its standard phrasing.
pub const QUESTION_SURROUNDING: &str = "question_surrounding";
/// Template rendering a hint inside its standard phrasing.
pub const HINT_SURROUNDING: &str = "hint_surrounding";
/// Template introducing an example answer.
pub const EXAMPLE_INTRO: &str = "example";
/// Question asked after repeating an answer back.
pub const CONFIRM_QUESTION: &str = "is that correct";
/// Choices offered by [`CONFIRM_QUESTION`].
pub const CONFIRM_CHOICES: [&str; 2] = ["affirm_correct", "negate_wrong"];

struct Fragment {
    intent: String,
    text: Option<String>,
    classification: Classification,
}

impl Fragment {
    fn plain(intent: &str, text: String) -> Self {
        Self {
            intent: normalize_intent(intent),
            text: Some(text),
            classification: Classification::Plain,
        }
    }
}

/// Builds the actions of one turn.
pub struct ResponseComposer {
    peer: UserId,
    loader: SelectiveTemplateLoader,
    sequence: Vec<ChatAction>,
    inside_sentence: bool,
}

impl ResponseComposer {
    /// Creates an empty composer for messages to `peer`.
    #[must_use]
    pub fn new(peer: UserId, loader: SelectiveTemplateLoader) -> Self {
        Self {
            peer,
            loader,
            sequence: Vec::new(),
            inside_sentence: false,
        }
    }

    /// The user the actions go to.
    #[must_use]
    pub fn peer(&self) -> UserId {
        self.peer
    }

    /// The template loader, for renders outside of composed messages.
    #[must_use]
    pub fn loader(&self) -> &SelectiveTemplateLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut SelectiveTemplateLoader {
        &mut self.loader
    }

    fn question_parameters(&self, question: &Question) -> Result<Parameters, ComposeError> {
        let value = render_question(question, self.loader.environment())?;
        Ok(Parameters::from([("question".to_string(), value)]))
    }

    /// The actions so far, without delays.
    #[must_use]
    pub fn actions(&self) -> &[ChatAction] {
        &self.sequence
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of actions so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Says `intent`, continuing the current message.
    ///
    /// # Errors
    ///
    /// Returns template failures and invalid joins.
    pub fn say(&mut self, intent: &str) -> Result<&mut Self, ComposeError> {
        self.say_with(intent, &Parameters::new())
    }

    /// Says `intent` rendered with `parameters`, continuing the current message.
    ///
    /// # Errors
    ///
    /// As [`say`](Self::say).
    pub fn say_with(&mut self, intent: &str, parameters: &Parameters) -> Result<&mut Self, ComposeError> {
        let fragment = self.render_intent(intent, parameters)?;
        self.push(fragment, ActionType::Saying, None, None, false)?;
        Ok(self)
    }

    /// Says `intent` in a new message.
    ///
    /// # Errors
    ///
    /// As [`say`](Self::say).
    pub fn then_say(&mut self, intent: &str) -> Result<&mut Self, ComposeError> {
        self.then_say_with(intent, &Parameters::new())
    }

    /// Says `intent` rendered with `parameters` in a new message.
    ///
    /// # Errors
    ///
    /// As [`say`](Self::say).
    pub fn then_say_with(
        &mut self,
        intent: &str,
        parameters: &Parameters,
    ) -> Result<&mut Self, ComposeError> {
        let fragment = self.render_intent(intent, parameters)?;
        self.push(fragment, ActionType::Saying, None, None, true)?;
        Ok(self)
    }

    /// Says `intent`, or the intent text itself when no template is viable.
    ///
    /// # Errors
    ///
    /// Returns template failures other than a missing template.
    pub fn say_or_literal(&mut self, intent: &str) -> Result<&mut Self, ComposeError> {
        let fragment = self.render_or_literal(intent, &Parameters::new())?;
        self.push(fragment, ActionType::Saying, None, None, false)?;
        Ok(self)
    }

    /// Renders `text` as a one-off template and says it under `intent`.
    ///
    /// # Errors
    ///
    /// Returns rendering failures and invalid joins.
    pub fn say_literal(&mut self, intent: &str, text: &str) -> Result<&mut Self, ComposeError> {
        let text = self.loader.render_literal(text, &Parameters::new())?;
        self.push(Fragment::plain(intent, text), ActionType::Saying, None, None, false)?;
        Ok(self)
    }

    /// Asks `intent`, continuing the current message.
    ///
    /// # Errors
    ///
    /// As [`say`](Self::say).
    pub fn ask(&mut self, intent: &str) -> Result<&mut Self, ComposeError> {
        let fragment = self.render_intent(intent, &Parameters::new())?;
        self.push(fragment, ActionType::AskingQuestion, None, None, false)?;
        Ok(self)
    }

    /// Asks `intent` offering quick-reply `choices`, which are intents too.
    ///
    /// # Errors
    ///
    /// Returns `MultipleChoiceActions` if another action already has choices.
    pub fn ask_with_choices(&mut self, intent: &str, choices: &[&str]) -> Result<&mut Self, ComposeError> {
        self.ask_choices(intent, choices, false)
    }

    /// Asks `intent` in a new message.
    ///
    /// # Errors
    ///
    /// As [`say`](Self::say).
    pub fn then_ask(&mut self, intent: &str) -> Result<&mut Self, ComposeError> {
        let fragment = self.render_intent(intent, &Parameters::new())?;
        self.push(fragment, ActionType::AskingQuestion, None, None, true)?;
        Ok(self)
    }

    /// Asks `intent` with choices in a new message.
    ///
    /// # Errors
    ///
    /// As [`ask_with_choices`](Self::ask_with_choices).
    pub fn then_ask_with_choices(
        &mut self,
        intent: &str,
        choices: &[&str],
    ) -> Result<&mut Self, ComposeError> {
        self.ask_choices(intent, choices, true)
    }

    /// Asks a questionnaire question, continuing the current message.
    ///
    /// # Errors
    ///
    /// As [`ask_with_choices`](Self::ask_with_choices).
    pub fn ask_question(&mut self, question: &Question) -> Result<&mut Self, ComposeError> {
        self.question(question, false)
    }

    /// Asks a questionnaire question in a new message.
    ///
    /// # Errors
    ///
    /// As [`ask_with_choices`](Self::ask_with_choices).
    pub fn then_ask_question(&mut self, question: &Question) -> Result<&mut Self, ComposeError> {
        self.question(question, true)
    }

    /// Sends the question's hint in a new message.
    ///
    /// # Errors
    ///
    /// Returns `MissingQuestionText` when the question has no hint.
    pub fn give_hint(&mut self, question: &Question) -> Result<&mut Self, ComposeError> {
        let hint = question.hint().ok_or_else(|| missing(question, "hint"))?;
        let parameters = self.question_parameters(question)?;
        let text = if question.skips_surrounding(Surrounding::Hint) {
            self.loader.render_literal(hint, &parameters)?
        } else {
            self.loader.render(HINT_SURROUNDING, &parameters)?.1
        };
        self.push(Fragment::plain("give_hint", text), ActionType::Saying, None, None, true)?;
        Ok(self)
    }

    /// Sends the question's example answer in a new message.
    ///
    /// # Errors
    ///
    /// Returns `MissingQuestionText` when the question has no example.
    pub fn give_example(&mut self, question: &Question) -> Result<&mut Self, ComposeError> {
        let example = question.example().ok_or_else(|| missing(question, "example"))?;
        let parameters = self.question_parameters(question)?;
        let example = self.loader.render_literal(example, &parameters)?;
        let text = if question.skips_surrounding(Surrounding::Example) {
            example
        } else {
            let intro = self.loader.render(EXAMPLE_INTRO, &parameters)?.1;
            format!("{intro} {example}")
        };
        self.push(Fragment::plain("give_example", text), ActionType::Saying, None, None, true)?;
        Ok(self)
    }

    /// Announces a questionnaire in a new message.
    ///
    /// # Errors
    ///
    /// Returns rendering failures.
    pub fn send_title(&mut self, questionnaire: &Questionnaire) -> Result<&mut Self, ComposeError> {
        let text = self
            .loader
            .render_literal(questionnaire.title(), &Parameters::new())?;
        self.push(
            Fragment::plain(questionnaire.id(), text),
            ActionType::Saying,
            None,
            None,
            true,
        )?;
        Ok(self)
    }

    /// Repeats the answer back and asks whether it is correct.
    ///
    /// # Errors
    ///
    /// Returns `MissingQuestionText` when the question has no confirm text.
    pub fn ask_to_confirm(&mut self, question: &Question, answer: &str) -> Result<&mut Self, ComposeError> {
        let confirm = question.confirm().ok_or_else(|| missing(question, "confirm text"))?;
        let mut parameters = self.question_parameters(question)?;
        parameters.insert("answer".to_string(), JsonValue::from(answer));
        let text = self.loader.render_literal(confirm, &parameters)?;
        self.push(Fragment::plain("confirm_answer", text), ActionType::Saying, None, None, true)?;
        self.ask_choices(CONFIRM_QUESTION, &CONFIRM_CHOICES, false)
    }

    /// Acknowledges an answer by restating it, in a new message.
    ///
    /// # Errors
    ///
    /// Returns `MissingQuestionText` when the question has no grounding text.
    pub fn implicitly_ground(&mut self, question: &Question, answer: &str) -> Result<&mut Self, ComposeError> {
        let grounding = question
            .implicit_grounding()
            .ok_or_else(|| missing(question, "implicit grounding"))?;
        let mut parameters = self.question_parameters(question)?;
        parameters.insert("answer".to_string(), JsonValue::from(answer));
        let text = self.loader.render_literal(grounding, &parameters)?;
        self.push(Fragment::plain("grounding_answer", text), ActionType::Saying, None, None, true)?;
        Ok(self)
    }

    /// Sends a media file, optionally captioned by a template.
    ///
    /// # Errors
    ///
    /// Returns template failures of the caption.
    pub fn send_media(&mut self, media_id: &str, caption: Option<&str>) -> Result<&mut Self, ComposeError> {
        let media_id = normalize_intent(media_id);
        let fragment = match caption {
            Some(intent) => self.render_intent(intent, &Parameters::new())?,
            None => Fragment {
                intent: media_id.clone(),
                text: None,
                classification: Classification::Plain,
            },
        };
        self.push(fragment, ActionType::SendingMedia, None, Some(media_id), true)?;
        Ok(self)
    }

    /// Overrides the reading delay of the last action.
    pub fn with_delay(&mut self, delay: impl Into<Duration>) -> &mut Self {
        if let Some(action) = self.sequence.last_mut() {
            action.set_delay(delay.into());
        }
        self
    }

    /// Finishes the turn, assigning reading delays to actions without one.
    #[must_use]
    pub fn collect_actions(mut self, pacing: &PacingConfig) -> Vec<ChatAction> {
        for (index, action) in self.sequence.iter_mut().enumerate() {
            if action.delay().is_none() {
                let chars = action.render_plain().chars().count();
                action.set_delay(pacing.delay_for(index, chars));
            }
        }
        self.sequence
    }

    fn render_intent(&mut self, intent: &str, parameters: &Parameters) -> Result<Fragment, ComposeError> {
        let (template, text) = self.loader.render(intent, parameters)?;
        Ok(Fragment {
            intent: normalize_intent(intent),
            text: Some(text),
            classification: template.classification(),
        })
    }

    fn render_or_literal(&mut self, intent: &str, parameters: &Parameters) -> Result<Fragment, ComposeError> {
        match self.render_intent(intent, parameters) {
            Err(ComposeError::Template(e)) if e.is_no_viable_template() => {
                debug!(intent, "Rendering intent literally");
                let text = self.loader.render_literal(intent, parameters)?;
                Ok(Fragment::plain(intent, text))
            }
            other => other,
        }
    }

    fn render_choices(&mut self, choices: &[String]) -> Result<Vec<String>, ComposeError> {
        choices
            .iter()
            .map(|choice| {
                self.render_or_literal(choice, &Parameters::new())
                    .map(|fragment| fragment.text.unwrap_or_default())
            })
            .collect()
    }

    fn ask_choices(&mut self, intent: &str, choices: &[&str], new_message: bool) -> Result<&mut Self, ComposeError> {
        let fragment = self.render_intent(intent, &Parameters::new())?;
        let choices: Vec<String> = choices.iter().map(|c| (*c).to_string()).collect();
        let choices = self.render_choices(&choices)?;
        self.push(fragment, ActionType::AskingQuestion, Some(choices), None, new_message)?;
        Ok(self)
    }

    fn question(&mut self, question: &Question, new_message: bool) -> Result<&mut Self, ComposeError> {
        let parameters = self.question_parameters(question)?;
        let text = if question.skips_surrounding(Surrounding::Title) {
            self.loader.render_literal(question.title(), &parameters)?
        } else {
            self.loader.render(QUESTION_SURROUNDING, &parameters)?.1
        };
        let choices = if question.choices().is_empty() {
            None
        } else {
            Some(self.render_choices(question.choices())?)
        };
        self.push(
            Fragment::plain(question.id(), text),
            ActionType::AskingQuestion,
            choices,
            None,
            new_message,
        )?;
        Ok(self)
    }

    fn push(
        &mut self,
        fragment: Fragment,
        action_type: ActionType,
        choices: Option<Vec<String>>,
        media_id: Option<String>,
        new_message: bool,
    ) -> Result<(), ComposeError> {
        if choices.is_some() && self.sequence.iter().any(|a| a.choices().is_some()) {
            return Err(ComposeError::MultipleChoiceActions {
                intent: fragment.intent,
            });
        }
        let continues = matches!(
            fragment.classification,
            Classification::Suffix | Classification::Conjunction
        );
        let last_has_text = self
            .sequence
            .last()
            .is_some_and(|a| a.text_parts().iter().any(|p| !p.is_empty()));

        if new_message || self.sequence.is_empty() || action_type == ActionType::SendingMedia {
            self.start_action(fragment, action_type, choices, media_id);
            return Ok(());
        }
        if !last_has_text {
            if continues {
                return Err(ComposeError::NothingToAppendTo {
                    intent: fragment.intent,
                });
            }
            self.start_action(fragment, action_type, choices, media_id);
            return Ok(());
        }
        self.append(fragment, action_type, choices)
    }

    fn start_action(
        &mut self,
        fragment: Fragment,
        action_type: ActionType,
        choices: Option<Vec<String>>,
        media_id: Option<String>,
    ) {
        let mut action = ChatAction::new(action_type, self.peer).with_intent(&fragment.intent);
        if let Some(text) = fragment.text {
            action.push_text(capitalize(&text));
        }
        if let Some(choices) = choices {
            action.set_choices(choices);
        }
        if let Some(media_id) = media_id {
            action = action.with_media(media_id);
        }
        self.inside_sentence = matches!(
            fragment.classification,
            Classification::Prefix | Classification::Conjunction
        );
        self.sequence.push(action);
    }

    fn append(
        &mut self,
        fragment: Fragment,
        action_type: ActionType,
        choices: Option<Vec<String>>,
    ) -> Result<(), ComposeError> {
        let Fragment {
            intent,
            text,
            classification,
        } = fragment;
        let inside_sentence = self.inside_sentence;
        let Some(action) = self.sequence.last_mut() else {
            return Err(ComposeError::NothingToAppendTo { intent });
        };
        let previous = action.last_text_mut().map(|p| p.clone()).unwrap_or_default();
        if classification == Classification::Conjunction && ends_sentence(&previous) {
            return Err(ComposeError::ConjunctionAfterSentenceEnd { intent });
        }

        if action_type == ActionType::AskingQuestion {
            action.set_action_type(ActionType::AskingQuestion);
        }
        if let Some(choices) = choices {
            action.set_choices(choices);
        }
        action.add_intent(&intent);
        let Some(text) = text else {
            return Ok(());
        };

        match classification {
            Classification::Conjunction => {
                action.push_text(joiner(&previous, &text));
                action.push_text(decapitalize(&text));
                self.inside_sentence = true;
            }
            Classification::Prefix => {
                start_sentence(action, &capitalize(&text));
                self.inside_sentence = true;
            }
            Classification::Suffix => {
                start_sentence(action, &decapitalize(&text));
                self.inside_sentence = false;
            }
            Classification::Plain if inside_sentence => {
                action.push_text(joiner(&previous, &text));
                action.push_text(decapitalize(&text));
                self.inside_sentence = false;
            }
            Classification::Plain => {
                start_sentence(action, &capitalize(&text));
                self.inside_sentence = false;
            }
        }
        Ok(())
    }
}

/// The question as a template variable, with its title, hint and example
/// rendered against `scope`.
///
/// Templates interpolate variables as plain text, so the question's own
/// markup is resolved here.
///
/// # Errors
///
/// Returns `Syntax` or `Render` failures of the question's texts.
pub fn render_question(question: &Question, scope: &dyn Scope) -> Result<JsonValue, TemplateError> {
    let mut value = question.to_value();
    render_fields(&mut value, &["title", "hint", "example"], scope)?;
    Ok(value)
}

/// The questionnaire as a template variable, with its title rendered.
///
/// # Errors
///
/// Returns `Syntax` or `Render` failures of the title.
pub fn render_questionnaire(questionnaire: &Questionnaire, scope: &dyn Scope) -> Result<JsonValue, TemplateError> {
    let mut value = questionnaire.to_value();
    render_fields(&mut value, &["title"], scope)?;
    Ok(value)
}

fn render_fields(value: &mut JsonValue, fields: &[&str], scope: &dyn Scope) -> Result<(), TemplateError> {
    let Some(object) = value.as_object_mut() else {
        return Ok(());
    };
    for field in fields {
        if let Some(JsonValue::String(text)) = object.get_mut(*field) {
            *text = render_str(text.as_str(), scope)?;
        }
    }
    Ok(())
}

fn missing(question: &Question, part: &'static str) -> ComposeError {
    ComposeError::MissingQuestionText {
        question: question.id().to_string(),
        part,
    }
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '!', '?'])
}

/// Separator between an open sentence and its continuation.
fn joiner(previous: &str, next: &str) -> &'static str {
    let previous_spaced = previous.ends_with(char::is_whitespace);
    let next_punctuated = next.starts_with(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    if previous_spaced || next_punctuated { "" } else { " " }
}

/// Terminates the previous sentence unless it already ends in punctuation
/// or an emoji, then adds `text` as a new sentence.
fn start_sentence(action: &mut ChatAction, text: &str) {
    if let Some(previous) = action.last_text_mut() {
        let needs_period = previous
            .chars()
            .last()
            .is_some_and(|c| !c.is_ascii_punctuation() && !c.is_whitespace())
            && !ends_with_emoji(previous);
        if needs_period {
            previous.push('.');
        }
        if !previous.ends_with(char::is_whitespace) {
            action.push_text(" ");
        }
    }
    action.push_text(text);
}

impl fmt::Debug for ResponseComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseComposer")
            .field("peer", &self.peer)
            .field("sequence", &self.sequence)
            .field("inside_sentence", &self.inside_sentence)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ResponseComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, action) in self.sequence.iter().enumerate() {
            if index > 0 {
                f.write_str(" then ")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_templates::{LeastRecentlyUsed, TemplateBank, TemplateEnvironment};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const YAML: &str = r#"
a: a
b:
  suffix: yes
  text: b
hello: Hallo!
what_i_can_do: ich kann Ihnen helfen
sorry:
  prefix: yes
  text: das tut mir leid,
invalid_answer: das ist keine gültige Antwort
but:
  conjunction: yes
  text: aber
did_not_understand: ich habe Sie nicht verstanden
claim_damage: Wollen Sie einen Schaden melden?
affirm_yes: Ja
is_that_correct: Ist das korrekt?
affirm_correct: Ja, genau
question_surrounding: "{{ question.title }}"
hint_surrounding: "Hinweis: {{ question.hint }}"
example: "Zum Beispiel:"
"#;

    fn composer() -> ResponseComposer {
        let bank = TemplateBank::from_yaml_str("inline", YAML).expect("valid templates");
        let loader = SelectiveTemplateLoader::new(
            Arc::new(bank),
            Box::new(LeastRecentlyUsed::new()),
            TemplateEnvironment::new(),
        );
        ResponseComposer::new(UserId::new(), loader)
    }

    fn texts(composer: &ResponseComposer) -> Vec<String> {
        composer.actions().iter().map(ChatAction::render).collect()
    }

    fn question() -> Question {
        Question::new("imei", "Wie lautet die IMEI Ihres Handys?")
            .required()
            .with_hint("Sie finden sie unter *#06#")
            .with_example("356938035643809")
            .with_confirm("Ihre IMEI ist {{ answer }}")
    }

    #[test]
    fn suffix_finishes_the_sentence_and_lowercases() {
        let mut composer = composer();
        composer.say("a").and_then(|c| c.say("b")).expect("composes");
        assert_eq!(texts(&composer), vec!["A. b"]);
        assert_eq!(composer.actions()[0].intents(), ["a", "b"]);
    }

    #[test]
    fn then_say_starts_a_new_message() {
        let mut composer = composer();
        composer.say("a").and_then(|c| c.then_say("b")).expect("composes");
        assert_eq!(texts(&composer), vec!["A", "B"]);
    }

    #[test]
    fn prefix_opens_a_sentence_the_next_template_continues() {
        let mut composer = composer();
        composer
            .say("hello")
            .and_then(|c| c.say("sorry"))
            .and_then(|c| c.say("invalid_answer"))
            .expect("composes");
        assert_eq!(
            texts(&composer),
            vec!["Hallo! Das tut mir leid, das ist keine gültige Antwort"]
        );
    }

    #[test]
    fn conjunctions_join_open_sentences() {
        let mut composer = composer();
        composer
            .say("sorry")
            .and_then(|c| c.say("but"))
            .and_then(|c| c.say("did_not_understand"))
            .expect("composes");
        assert_eq!(
            texts(&composer),
            vec!["Das tut mir leid, aber ich habe Sie nicht verstanden"]
        );
    }

    #[test]
    fn conjunctions_cannot_follow_a_finished_sentence() {
        let mut composer = composer();
        composer.say("hello").expect("composes");
        let err = composer.say("but").expect_err("invalid join");
        assert!(matches!(err, ComposeError::ConjunctionAfterSentenceEnd { .. }));
        assert_eq!(texts(&composer), vec!["Hallo!"]);
    }

    #[test]
    fn plain_templates_start_sentences() {
        let mut composer = composer();
        composer
            .say("a")
            .and_then(|c| c.say("what_i_can_do"))
            .expect("composes");
        assert_eq!(texts(&composer), vec!["A. Ich kann Ihnen helfen"]);
    }

    #[test]
    fn only_one_action_may_carry_choices() {
        let mut composer = composer();
        composer
            .ask_with_choices("claim_damage", &["affirm_yes", "negate_no"])
            .expect("composes");
        assert_eq!(
            composer.actions()[0].choices(),
            Some(&["Ja".to_string(), "negate_no".to_string()][..])
        );
        let err = composer
            .then_ask_with_choices("claim_damage", &["affirm_yes"])
            .expect_err("second choices");
        assert!(matches!(err, ComposeError::MultipleChoiceActions { .. }));
    }

    #[test]
    fn asking_turns_the_message_into_a_question() {
        let mut composer = composer();
        composer.say("hello").and_then(|c| c.ask("claim_damage")).expect("composes");
        assert_eq!(composer.actions()[0].action_type(), ActionType::AskingQuestion);
        assert_eq!(texts(&composer), vec!["Hallo! Wollen Sie einen Schaden melden?"]);
    }

    #[test]
    fn unknown_intents_fall_back_to_literals_only_when_asked_to() {
        let mut composer = composer();
        let err = composer.say("unknown").expect_err("no template");
        assert!(matches!(err, ComposeError::Template(ref e) if e.is_no_viable_template()));
        composer.say_or_literal("unknown").expect("literal");
        assert_eq!(texts(&composer), vec!["Unknown"]);
    }

    #[test]
    fn questions_hints_and_examples() {
        let question = question();
        let mut composer = composer();
        composer
            .then_ask_question(&question)
            .and_then(|c| c.give_hint(&question))
            .and_then(|c| c.give_example(&question))
            .expect("composes");
        assert_eq!(
            texts(&composer),
            vec![
                "Wie lautet die IMEI Ihres Handys?",
                "Hinweis: Sie finden sie unter *#06#",
                "Zum Beispiel: 356938035643809",
            ]
        );
        assert_eq!(composer.actions()[0].intents(), ["imei"]);
        assert_eq!(composer.actions()[1].intents(), ["give_hint"]);
    }

    #[test]
    fn confirmation_repeats_the_answer_and_offers_choices() {
        let question = question();
        let mut composer = composer();
        composer.ask_to_confirm(&question, "12345").expect("composes");
        assert_eq!(composer.len(), 1);
        let action = &composer.actions()[0];
        assert_eq!(action.render(), "Ihre IMEI ist 12345. Ist das korrekt?");
        assert_eq!(action.action_type(), ActionType::AskingQuestion);
        assert_eq!(action.intents(), ["confirm_answer", "is_that_correct"]);
        assert!(action.choices().is_some());
    }

    #[test]
    fn answers_are_repeated_verbatim() {
        let question = question();
        for answer in ["{{ user.is_admin }}", "Ist mir {{ runtergefallen", "{% if formal_address %}x"] {
            let mut composer = composer();
            composer.ask_to_confirm(&question, answer).expect("composes");
            assert_eq!(
                composer.actions()[0].render(),
                format!("Ihre IMEI ist {answer}. Ist das korrekt?")
            );
        }
    }

    #[test]
    fn question_markup_is_resolved_inside_the_surrounding() {
        let question = Question::new(
            "model",
            "Welches Handy {% if formal_address %}haben Sie{% else %}hast du{% endif %}?",
        )
        .with_hint("{{ pronoun('possessive', 'nominative', 'neuter') }} Modell steht hinten drauf");
        let mut composer = composer();
        composer
            .ask_question(&question)
            .and_then(|c| c.give_hint(&question))
            .expect("composes");
        assert_eq!(
            texts(&composer),
            vec!["Welches Handy haben Sie?", "Hinweis: Ihr Modell steht hinten drauf"]
        );
    }

    #[test]
    fn missing_question_texts_are_reported() {
        let bare = Question::new("name", "Wie heißen Sie?");
        let mut composer = composer();
        assert!(matches!(
            composer.give_hint(&bare),
            Err(ComposeError::MissingQuestionText { part: "hint", .. })
        ));
    }

    #[test]
    fn media_gets_its_own_message() {
        let mut composer = composer();
        composer
            .say("hello")
            .and_then(|c| c.send_media("Happy Birthday", None))
            .and_then(|c| c.say("a"))
            .expect("composes");
        assert_eq!(composer.len(), 3);
        assert_eq!(composer.actions()[1].media_id(), Some("happy_birthday"));
        assert!(composer.actions()[1].text_parts().is_empty());

        composer.send_media("sticker", None).expect("composes");
        assert!(matches!(
            composer.say("b"),
            Err(ComposeError::NothingToAppendTo { .. })
        ));
        assert_eq!(composer.len(), 4);
    }

    #[test]
    fn delays_escalate_and_respect_overrides() {
        let mut composer = composer();
        composer
            .say("a")
            .and_then(|c| c.then_say("a"))
            .and_then(|c| c.then_say("a"))
            .expect("composes");
        composer.with_delay(Duration::from_millis(10));
        let actions = composer.collect_actions(&PacingConfig::default());
        let delays: Vec<_> = actions.iter().filter_map(ChatAction::delay).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(380),
                Duration::from_millis(1300),
                Duration::from_millis(10),
            ]
        );
    }

    #[test]
    fn display_lists_the_actions() {
        let mut composer = composer();
        composer.say("a").and_then(|c| c.then_ask("claim_damage")).expect("composes");
        let shown = composer.to_string();
        assert!(shown.contains(" then "));
    }
}
