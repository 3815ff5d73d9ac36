//! Questionnaires the bot walks the user through.
//!
//! A catalog is an ordered list of questionnaires, each an ordered list of
//! questions. Question ids are unique across the whole catalog because
//! answers are stored by question id alone.

use crate::error::QuestionnaireError;
use crate::validator::{AnswerValidator, ValidatorRegistry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Parts of a question that are normally wrapped in a surrounding template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surrounding {
    /// The question title (`question_surrounding`).
    Title,
    /// The hint (`hint_surrounding`).
    Hint,
    /// The example (prefixed with the `example` template).
    Example,
}

/// A single question.
#[derive(Debug, Clone)]
pub struct Question {
    id: String,
    title: String,
    required: bool,
    choices: Vec<String>,
    hint: Option<String>,
    example: Option<String>,
    confirm: Option<String>,
    implicit_grounding: Option<String>,
    no_surrounding: BTreeSet<Surrounding>,
    pattern: Option<Regex>,
    validator: Option<Arc<dyn AnswerValidator>>,
}

impl Question {
    /// Creates an optional question with no hint, example or validation.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            required: false,
            choices: Vec::new(),
            hint: None,
            example: None,
            confirm: None,
            implicit_grounding: None,
            no_surrounding: BTreeSet::new(),
            pattern: None,
            validator: None,
        }
    }

    /// Marks the question as required; it cannot be skipped.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the quick-reply choices (template intents).
    #[must_use]
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the hint text.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Sets the example text.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Asks the user to confirm answers with this template text.
    #[must_use]
    pub fn with_confirm(mut self, confirm: impl Into<String>) -> Self {
        self.confirm = Some(confirm.into());
        self
    }

    /// Sets the text used to implicitly ground an accepted answer.
    #[must_use]
    pub fn with_implicit_grounding(mut self, text: impl Into<String>) -> Self {
        self.implicit_grounding = Some(text.into());
        self
    }

    /// Renders the given part without its surrounding template.
    #[must_use]
    pub fn without_surrounding(mut self, part: Surrounding) -> Self {
        self.no_surrounding.insert(part);
        self
    }

    /// Requires answers to match `pattern` at their start.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if the pattern does not compile.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, QuestionnaireError> {
        let regex = Regex::new(pattern).map_err(|e| QuestionnaireError::InvalidPattern {
            question: self.id.clone(),
            reason: e.to_string(),
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// Runs answers through a validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn AnswerValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// The question id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The title template.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Whether the question may not be skipped.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The quick-reply choices.
    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// The hint template.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// The example template.
    #[must_use]
    pub fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }

    /// The confirmation template; answers need confirming when set.
    #[must_use]
    pub fn confirm(&self) -> Option<&str> {
        self.confirm.as_deref()
    }

    /// The implicit grounding template.
    #[must_use]
    pub fn implicit_grounding(&self) -> Option<&str> {
        self.implicit_grounding.as_deref()
    }

    /// Whether `part` is rendered without its surrounding template.
    #[must_use]
    pub fn skips_surrounding(&self, part: Surrounding) -> bool {
        self.no_surrounding.contains(&part)
    }

    /// Checks an answer and returns its normalized form.
    ///
    /// The pattern has to match at the start of the answer and the
    /// validator, if any, has to accept it.
    #[must_use]
    pub fn check(&self, answer: &str) -> Option<String> {
        let answer = answer.trim();
        if let Some(pattern) = &self.pattern
            && !pattern.find(answer).is_some_and(|m| m.start() == 0)
        {
            return None;
        }
        match &self.validator {
            Some(validator) => validator.validate(answer),
            None => Some(answer.to_string()),
        }
    }

    /// Whether the answer would be accepted.
    #[must_use]
    pub fn is_valid(&self, answer: &str) -> bool {
        self.check(answer).is_some()
    }

    /// The question as a template variable.
    #[must_use]
    pub fn to_value(&self) -> JsonValue {
        json!({
            "id": self.id,
            "title": self.title,
            "required": self.required,
            "choices": self.choices,
            "hint": self.hint,
            "example": self.example,
        })
    }
}

impl PartialEq for Question {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// An ordered group of questions.
#[derive(Debug, Clone, PartialEq)]
pub struct Questionnaire {
    id: String,
    title: String,
    questions: Vec<Question>,
}

impl Questionnaire {
    /// Creates a questionnaire.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            questions,
        }
    }

    /// The questionnaire id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The title template.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The questions in order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The first question without an answer.
    #[must_use]
    pub fn next_question(&self, answered: &BTreeSet<String>) -> Option<&Question> {
        self.questions.iter().find(|q| !answered.contains(q.id()))
    }

    /// Whether `question` opens this questionnaire.
    #[must_use]
    pub fn is_first_question(&self, question: &Question) -> bool {
        self.questions.first().is_some_and(|q| q.id() == question.id())
    }

    /// Share of this questionnaire's questions that have answers.
    #[must_use]
    pub fn completion_ratio(&self, answered: &BTreeSet<String>) -> f64 {
        if self.questions.is_empty() {
            return 1.0;
        }
        let done = self
            .questions
            .iter()
            .filter(|q| answered.contains(q.id()))
            .count();
        done as f64 / self.questions.len() as f64
    }

    /// The questionnaire as a template variable.
    #[must_use]
    pub fn to_value(&self) -> JsonValue {
        json!({ "id": self.id, "title": self.title, "length": self.questions.len() })
    }
}

/// Read-only source of questionnaires, loaded once at startup.
pub trait QuestionnaireProvider: Send + Sync {
    /// All questionnaires in the order they are asked.
    fn questionnaires(&self) -> &[Questionnaire];

    /// Finds a question by id.
    fn question(&self, id: &str) -> Option<&Question> {
        self.questionnaires()
            .iter()
            .flat_map(Questionnaire::questions)
            .find(|q| q.id() == id)
    }

    /// The first questionnaire that still has an unanswered question, by
    /// index, together with that question.
    fn next_unanswered(&self, answered: &BTreeSet<String>) -> Option<(usize, &Question)> {
        self.questionnaires()
            .iter()
            .enumerate()
            .find_map(|(i, qn)| qn.next_question(answered).map(|q| (i, q)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuestionnaire {
    title: String,
    questions: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuestion {
    title: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    choices: Vec<String>,
    hint: Option<String>,
    example: Option<String>,
    confirm: Option<String>,
    implicit_grounding: Option<String>,
    #[serde(default)]
    no_surrounding: Vec<Surrounding>,
    match_regex: Option<String>,
    validator: Option<String>,
}

/// The validated set of questionnaires.
#[derive(Debug, Clone, Default)]
pub struct QuestionnaireCatalog {
    questionnaires: Vec<Questionnaire>,
}

impl QuestionnaireCatalog {
    /// Builds a catalog, checking ids for uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` or `Empty` for malformed catalogs.
    pub fn new(questionnaires: Vec<Questionnaire>) -> Result<Self, QuestionnaireError> {
        let mut seen = HashSet::new();
        for questionnaire in &questionnaires {
            if questionnaire.questions.is_empty() {
                return Err(QuestionnaireError::Empty {
                    questionnaire: questionnaire.id.clone(),
                });
            }
            let ids = std::iter::once(questionnaire.id())
                .chain(questionnaire.questions.iter().map(Question::id));
            for id in ids {
                if !seen.insert(id.to_string()) {
                    return Err(QuestionnaireError::DuplicateId { id: id.to_string() });
                }
            }
        }
        Ok(Self { questionnaires })
    }

    /// Parses a YAML catalog, resolving validator names against `validators`.
    ///
    /// The document maps questionnaire ids to `{title, questions}`, where
    /// `questions` maps question ids to their definitions. Order is kept.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML, unknown validators, invalid
    /// patterns or duplicate ids.
    pub fn from_yaml_str(
        yaml: &str,
        validators: &ValidatorRegistry,
    ) -> Result<Self, QuestionnaireError> {
        let doc: serde_yaml::Mapping = serde_yaml::from_str(yaml).map_err(parse_error)?;
        let mut questionnaires = Vec::with_capacity(doc.len());
        for (id, body) in doc {
            let id = yaml_key(id)?;
            let raw: RawQuestionnaire = serde_yaml::from_value(body).map_err(parse_error)?;
            let mut questions = Vec::with_capacity(raw.questions.len());
            for (qid, qbody) in raw.questions {
                let qid = yaml_key(qid)?;
                let raw_question: RawQuestion = serde_yaml::from_value(qbody).map_err(parse_error)?;
                questions.push(build_question(qid, raw_question, validators)?);
            }
            questionnaires.push(Questionnaire::new(id, raw.title, questions));
        }
        Self::new(questionnaires)
    }

    /// Reads and parses a YAML catalog file.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the file cannot be read, otherwise as
    /// [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_path(
        path: impl AsRef<Path>,
        validators: &ValidatorRegistry,
    ) -> Result<Self, QuestionnaireError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| QuestionnaireError::Parse {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml, validators)
    }

    /// Total number of questions across all questionnaires.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questionnaires.iter().map(|q| q.questions.len()).sum()
    }
}

impl QuestionnaireProvider for QuestionnaireCatalog {
    fn questionnaires(&self) -> &[Questionnaire] {
        &self.questionnaires
    }
}

fn parse_error(e: serde_yaml::Error) -> QuestionnaireError {
    QuestionnaireError::Parse {
        reason: e.to_string(),
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, QuestionnaireError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        other => Err(QuestionnaireError::Parse {
            reason: format!("ids must be strings, found {other:?}"),
        }),
    }
}

fn build_question(
    id: String,
    raw: RawQuestion,
    validators: &ValidatorRegistry,
) -> Result<Question, QuestionnaireError> {
    let mut question = Question::new(id, raw.title).with_choices(raw.choices);
    question.required = raw.required;
    question.hint = raw.hint;
    question.example = raw.example;
    question.confirm = raw.confirm;
    question.implicit_grounding = raw.implicit_grounding;
    question.no_surrounding = raw.no_surrounding.into_iter().collect();
    if let Some(pattern) = raw.match_regex {
        question = question.with_pattern(&pattern)?;
    }
    if let Some(name) = raw.validator {
        let validator = validators
            .get(&name)
            .ok_or_else(|| QuestionnaireError::UnknownValidator {
                question: question.id.clone(),
                validator: name.clone(),
            })?;
        question = question.with_validator(validator);
    }
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
device:
  title: Your device
  questions:
    model:
      title: Which phone do you have?
      required: true
      hint: Look at the back of your phone.
      example: iPhone 8
    imei:
      title: What is the IMEI?
      match_regex: '\d{15}'
      confirm: 'Your IMEI is {{ answer }}?'
damage:
  title: The damage
  questions:
    description:
      title: What happened?
      no_surrounding: [hint]
"#;

    fn catalog() -> QuestionnaireCatalog {
        QuestionnaireCatalog::from_yaml_str(YAML, &ValidatorRegistry::new()).expect("valid yaml")
    }

    fn answered(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn yaml_order_is_preserved() {
        let catalog = catalog();
        let ids: Vec<&str> = catalog
            .questionnaires()
            .iter()
            .flat_map(Questionnaire::questions)
            .map(Question::id)
            .collect();
        assert_eq!(ids, ["model", "imei", "description"]);
        assert_eq!(catalog.total_questions(), 3);
    }

    #[test]
    fn fields_are_loaded() {
        let catalog = catalog();
        let model = catalog.question("model").expect("exists");
        assert!(model.is_required());
        assert_eq!(model.example(), Some("iPhone 8"));
        let imei = catalog.question("imei").expect("exists");
        assert!(imei.confirm().is_some());
        let description = catalog.question("description").expect("exists");
        assert!(description.skips_surrounding(Surrounding::Hint));
        assert!(!description.skips_surrounding(Surrounding::Title));
    }

    #[test]
    fn pattern_must_match_at_start() {
        let catalog = catalog();
        let imei = catalog.question("imei").expect("exists");
        assert!(imei.is_valid("490154203237518"));
        assert!(!imei.is_valid("imei 490154203237518"));
        assert!(!imei.is_valid("1234"));
    }

    #[test]
    fn next_unanswered_walks_questionnaires_in_order() {
        let catalog = catalog();
        let (index, q) = catalog.next_unanswered(&answered(&[])).expect("open");
        assert_eq!((index, q.id()), (0, "model"));
        let (index, q) = catalog
            .next_unanswered(&answered(&["model", "imei"]))
            .expect("open");
        assert_eq!((index, q.id()), (1, "description"));
        assert!(catalog
            .next_unanswered(&answered(&["model", "imei", "description"]))
            .is_none());
    }

    #[test]
    fn completion_ratio_counts_own_questions() {
        let catalog = catalog();
        let device = &catalog.questionnaires()[0];
        assert_eq!(device.completion_ratio(&answered(&["model", "description"])), 0.5);
        assert!(device.is_first_question(catalog.question("model").expect("exists")));
        assert!(!device.is_first_question(catalog.question("imei").expect("exists")));
    }

    #[test]
    fn unknown_validator_fails_the_load() {
        let yaml = "q:\n  title: Q\n  questions:\n    a:\n      title: A\n      validator: luhn\n";
        let err = QuestionnaireCatalog::from_yaml_str(yaml, &ValidatorRegistry::new())
            .expect_err("unknown validator");
        assert_eq!(
            err,
            QuestionnaireError::UnknownValidator {
                question: "a".to_string(),
                validator: "luhn".to_string()
            }
        );
    }

    #[test]
    fn registered_validator_normalizes_answers() {
        let mut validators = ValidatorRegistry::new();
        validators.register_fn("upper", |s| Some(s.to_uppercase()));
        let yaml = "q:\n  title: Q\n  questions:\n    a:\n      title: A\n      validator: upper\n";
        let catalog = QuestionnaireCatalog::from_yaml_str(yaml, &validators).expect("valid");
        let a = catalog.question("a").expect("exists");
        assert_eq!(a.check("  abc "), Some("ABC".to_string()));
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let err = QuestionnaireCatalog::new(vec![
            Questionnaire::new("one", "One", vec![Question::new("a", "A")]),
            Questionnaire::new("two", "Two", vec![Question::new("a", "A again")]),
        ])
        .expect_err("duplicate");
        assert_eq!(err, QuestionnaireError::DuplicateId { id: "a".to_string() });
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = Question::new("a", "A").with_pattern("(").expect_err("invalid");
        assert!(matches!(err, QuestionnaireError::InvalidPattern { .. }));
    }
}
