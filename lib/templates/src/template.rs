use crate::error::TemplateError;
use crate::expression::{Expr, Scope};
use crate::render::TextTemplate;
use parlance_core::normalize_intent;
use std::fmt;
use tracing::error;

/// How a rendered template joins the text before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Classification {
    /// A sentence of its own.
    #[default]
    Plain,
    /// Opens a sentence that the next template completes.
    Prefix,
    /// Trails the previous sentence.
    Suffix,
    /// Continues the open sentence without a separator.
    Conjunction,
}

impl Classification {
    /// Builds a classification from the individual flags of a definition.
    ///
    /// # Errors
    ///
    /// Returns `ConflictingClassification` when more than one flag is set.
    pub fn from_flags(
        intent: &str,
        prefix: bool,
        suffix: bool,
        conjunction: bool,
    ) -> Result<Self, TemplateError> {
        match (prefix, suffix, conjunction) {
            (false, false, false) => Ok(Self::Plain),
            (true, false, false) => Ok(Self::Prefix),
            (false, true, false) => Ok(Self::Suffix),
            (false, false, true) => Ok(Self::Conjunction),
            _ => Err(TemplateError::ConflictingClassification {
                intent: intent.to_string(),
            }),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Conjunction => "conjunction",
        })
    }
}

#[derive(Debug, Clone)]
struct Condition {
    source: String,
    expr: Expr,
}

/// One candidate response for an intent.
#[derive(Debug, Clone)]
pub struct ResponseTemplate {
    intent: String,
    text: TextTemplate,
    classification: Classification,
    condition: Option<Condition>,
}

impl ResponseTemplate {
    /// Parses a plain template.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTemplate` for blank text and `Syntax` for malformed markup.
    pub fn new(intent: &str, text: &str) -> Result<Self, TemplateError> {
        let intent = normalize_intent(intent);
        if text.trim().is_empty() {
            return Err(TemplateError::EmptyTemplate { intent });
        }
        Ok(Self {
            text: TextTemplate::parse(text)?,
            intent,
            classification: Classification::Plain,
            condition: None,
        })
    }

    #[must_use]
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    /// Attaches a condition the selection context must satisfy.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` when the condition does not parse.
    pub fn with_condition(mut self, source: &str) -> Result<Self, TemplateError> {
        let expr = Expr::parse(source).map_err(|e| TemplateError::Syntax {
            template: source.to_string(),
            reason: e.to_string(),
        })?;
        self.condition = Some(Condition {
            source: source.to_string(),
            expr,
        });
        Ok(self)
    }

    #[must_use]
    pub fn intent(&self) -> &str {
        &self.intent
    }

    /// The template markup, also used as its identity for usage counting.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.source()
    }

    #[must_use]
    pub fn classification(&self) -> Classification {
        self.classification
    }

    #[must_use]
    pub fn is_prefix(&self) -> bool {
        self.classification == Classification::Prefix
    }

    #[must_use]
    pub fn is_suffix(&self) -> bool {
        self.classification == Classification::Suffix
    }

    #[must_use]
    pub fn is_conjunction(&self) -> bool {
        self.classification == Classification::Conjunction
    }

    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_ref().map(|c| c.source.as_str())
    }

    /// Evaluates the condition. Unconditional templates always pass; a
    /// condition that fails to evaluate is logged and counts as unmet.
    #[must_use]
    pub fn check_condition(&self, scope: &dyn Scope) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };
        match condition.expr.is_satisfied(scope) {
            Ok(satisfied) => satisfied,
            Err(e) => {
                error!(
                    intent = %self.intent,
                    condition = %condition.source,
                    error = %e,
                    "Template condition failed to evaluate"
                );
                false
            }
        }
    }

    /// Renders the text, trimmed.
    ///
    /// # Errors
    ///
    /// Returns `Render` when an output expression fails.
    pub fn render(&self, scope: &dyn Scope) -> Result<String, TemplateError> {
        self.text.render_trimmed(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, json};
    use std::collections::BTreeMap;

    fn scope(completion: f64) -> BTreeMap<String, JsonValue> {
        let mut vars = BTreeMap::new();
        vars.insert("questionnaire_completion".to_string(), json!(completion));
        vars
    }

    #[test]
    fn intents_are_normalized() {
        let template = ResponseTemplate::new("What I can do", "Ich kann...").expect("valid");
        assert_eq!(template.intent(), "what_i_can_do");
        assert_eq!(template.classification(), Classification::Plain);
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(matches!(
            ResponseTemplate::new("hello", "  "),
            Err(TemplateError::EmptyTemplate { .. })
        ));
    }

    #[test]
    fn conditions_gate_templates() {
        let template = ResponseTemplate::new("progress", "Fast geschafft!")
            .and_then(|t| t.with_condition("questionnaire_completion > 0.8"))
            .expect("valid");
        assert!(template.check_condition(&scope(0.9)));
        assert!(!template.check_condition(&scope(0.2)));
        assert_eq!(template.condition(), Some("questionnaire_completion > 0.8"));
    }

    #[test]
    fn failing_conditions_count_as_unmet() {
        let template = ResponseTemplate::new("progress", "x")
            .and_then(|t| t.with_condition("no_such_variable"))
            .expect("valid");
        assert!(!template.check_condition(&scope(1.0)));
    }

    #[test]
    fn malformed_conditions_fail_to_load() {
        let err = ResponseTemplate::new("progress", "x")
            .and_then(|t| t.with_condition("a >"))
            .expect_err("malformed");
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn only_one_classification_flag_is_allowed() {
        assert_eq!(
            Classification::from_flags("x", false, true, false),
            Ok(Classification::Suffix)
        );
        assert!(matches!(
            Classification::from_flags("x", true, false, true),
            Err(TemplateError::ConflictingClassification { .. })
        ));
    }
}
