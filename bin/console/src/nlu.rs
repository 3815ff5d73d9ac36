//! Keyword intent recognition.
//!
//! Rules are tried in order and the first matching pattern wins. Named
//! capture groups become parameters, as do the fixed `parameters` of a rule:
//!
//! ```yaml
//! - intent: phone_broken
//!   patterns:
//!     - '(?P<damage_type>display|akku).*(kaputt|gesprungen)'
//! - intent: smalltalk.dialog.address
//!   patterns: ['duzen']
//!   parameters:
//!     formal_address: false
//! ```
//!
//! Messages no rule matches get the `fallback` intent.

use crate::error::NluError;
use async_trait::async_trait;
use parlance_conversation::MessageUnderstanding;
use parlance_core::User;
use parlance_dialog::{ClientError, NluClient};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Intent of messages no rule matches.
pub const FALLBACK_INTENT: &str = "fallback";

/// Bundled German keyword rules.
pub const INTENTS: &str = include_str!("../assets/intents.yaml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    intent: String,
    patterns: Vec<String>,
    #[serde(default)]
    parameters: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone)]
struct IntentRule {
    intent: String,
    patterns: Vec<Regex>,
    parameters: BTreeMap<String, JsonValue>,
}

impl IntentRule {
    fn understand(&self, text: &str) -> Option<MessageUnderstanding> {
        let (pattern, captures) = self
            .patterns
            .iter()
            .find_map(|p| p.captures(text).map(|c| (p, c)))?;
        let mut understanding = MessageUnderstanding::new(text, &self.intent);
        for (name, value) in &self.parameters {
            understanding = understanding.with_parameter(name.clone(), value.clone());
        }
        for name in pattern.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                understanding = understanding.with_parameter(name, value.as_str().to_lowercase());
            }
        }
        Some(understanding)
    }
}

/// Regex-based [`NluClient`].
#[derive(Debug, Clone, Default)]
pub struct KeywordNlu {
    rules: Vec<IntentRule>,
}

impl KeywordNlu {
    /// Parses a rule document. Patterns match case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed YAML, `Empty` for rules without
    /// patterns and `Pattern` for patterns that do not compile.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, NluError> {
        let raw: Vec<RawRule> = serde_yaml::from_str(yaml).map_err(|e| NluError::Parse {
            reason: e.to_string(),
        })?;
        let rules = raw
            .into_iter()
            .map(|rule| {
                if rule.patterns.is_empty() {
                    return Err(NluError::Empty { intent: rule.intent });
                }
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|pattern| {
                        RegexBuilder::new(pattern)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| NluError::Pattern {
                                intent: rule.intent.clone(),
                                pattern: pattern.clone(),
                                reason: e.to_string(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(IntentRule {
                    intent: rule.intent,
                    patterns,
                    parameters: rule.parameters,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(rules = rules.len(), "Loaded intent rules");
        Ok(Self { rules })
    }

    /// Reads and parses a rule file.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the file cannot be read, otherwise as
    /// [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_path(path: &Path) -> Result<Self, NluError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| NluError::Parse {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// The bundled rules.
    ///
    /// # Errors
    ///
    /// As [`from_yaml_str`](Self::from_yaml_str).
    pub fn bundled() -> Result<Self, NluError> {
        Self::from_yaml_str(INTENTS)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classifies a message.
    #[must_use]
    pub fn classify(&self, text: &str) -> MessageUnderstanding {
        let text = text.trim();
        let understanding = self
            .rules
            .iter()
            .find_map(|rule| rule.understand(text))
            .unwrap_or_else(|| MessageUnderstanding::new(text, FALLBACK_INTENT));
        debug!(text, intent = understanding.intent(), "Classified message");
        understanding
    }
}

#[async_trait]
impl NluClient for KeywordNlu {
    async fn understand(&self, text: &str, _user: &User) -> Result<MessageUnderstanding, ClientError> {
        Ok(self.classify(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn nlu() -> KeywordNlu {
        KeywordNlu::bundled().expect("bundled rules compile")
    }

    #[test]
    fn greetings_and_answers_are_recognized() {
        let nlu = nlu();
        assert_eq!(nlu.classify("Hallo!").intent(), "hello");
        assert_eq!(nlu.classify("Ja, gerne").intent(), "yes");
        assert_eq!(nlu.classify("nein danke").intent(), "no");
        assert_eq!(nlu.classify("Tschüss").intent(), "smalltalk.greetings.bye");
    }

    #[test]
    fn captures_become_parameters() {
        let understanding = nlu().classify("Mein DISPLAY ist gesprungen");
        assert_eq!(understanding.intent(), "phone_broken");
        assert_eq!(understanding.parameter_str("damage_type"), Some("display"));
    }

    #[test]
    fn fixed_parameters_are_attached() {
        let understanding = nlu().classify("Wollen wir uns duzen?");
        assert_eq!(understanding.intent(), "smalltalk.dialog.address");
        assert_eq!(understanding.parameter("formal_address"), Some(&json!(false)));
    }

    #[test]
    fn unknown_messages_fall_back() {
        let understanding = nlu().classify("Samsung Galaxy S9");
        assert_eq!(understanding.intent(), FALLBACK_INTENT);
        assert_eq!(understanding.text(), Some("Samsung Galaxy S9"));
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let err = KeywordNlu::from_yaml_str("- intent: broken\n  patterns: ['(']").expect_err("bad pattern");
        assert!(matches!(err, NluError::Pattern { .. }));
        let err = KeywordNlu::from_yaml_str("- intent: empty\n  patterns: []").expect_err("no patterns");
        assert_eq!(err, NluError::Empty { intent: "empty".to_string() });
    }
}
