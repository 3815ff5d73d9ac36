//! Response templates grouped by intent, loaded from YAML.
//!
//! An intent maps to a single text, a list of alternatives, or a mapping
//! with flags and conditions:
//!
//! ```yaml
//! hello: Hallo!
//! what_i_can_do:
//!   - Ich helfe dir bei deinem Schadensfall.
//!   - text: Wollen wir weitermachen?
//!     condition: has_answered_questions
//! sorry:
//!   prefix: yes
//!   choices:
//!     - Das tut mir leid,
//!     - Entschuldigung,
//! ```
//!
//! Flags on a mapping apply to all of its choices.

use crate::error::TemplateError;
use crate::template::{Classification, ResponseTemplate};
use parlance_core::normalize_intent;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Provides the candidate templates for an intent.
pub trait TemplateProvider: Send + Sync {
    /// Candidates in declaration order; empty for unknown intents.
    fn candidates(&self, intent: &str) -> &[Arc<ResponseTemplate>];

    fn contains(&self, intent: &str) -> bool {
        !self.candidates(intent).is_empty()
    }
}

/// In-memory template bank.
#[derive(Debug, Clone, Default)]
pub struct TemplateBank {
    templates: HashMap<String, Vec<Arc<ResponseTemplate>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Text(String),
    Choices(Vec<RawChoice>),
    Detailed(RawDetailed),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChoice {
    Text(String),
    Detailed(RawChoiceDetail),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChoiceDetail {
    text: String,
    condition: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDetailed {
    text: Option<String>,
    choices: Option<Vec<RawChoice>>,
    condition: Option<String>,
    #[serde(default, alias = "is_prefix")]
    prefix: Option<RawFlag>,
    #[serde(default, alias = "is_suffix")]
    suffix: Option<RawFlag>,
    #[serde(default, alias = "is_conjunction")]
    conjunction: Option<RawFlag>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

fn is_set(flag: Option<&RawFlag>) -> bool {
    match flag {
        None => false,
        Some(RawFlag::Bool(set)) => *set,
        Some(RawFlag::Text(text)) => {
            matches!(text.trim().to_ascii_lowercase().as_str(), "yes" | "true" | "y")
        }
    }
}

fn build_choice(
    intent: &str,
    choice: RawChoice,
    classification: Classification,
    shared_condition: Option<&str>,
) -> Result<ResponseTemplate, TemplateError> {
    let (text, condition) = match choice {
        RawChoice::Text(text) => (text, None),
        RawChoice::Detailed(detail) => (detail.text, detail.condition),
    };
    let template = ResponseTemplate::new(intent, &text)?.with_classification(classification);
    match condition.as_deref().or(shared_condition) {
        Some(condition) => template.with_condition(condition),
        None => Ok(template),
    }
}

fn build_entry(
    source: &str,
    intent: &str,
    entry: RawEntry,
) -> Result<Vec<ResponseTemplate>, TemplateError> {
    match entry {
        RawEntry::Text(text) => Ok(vec![ResponseTemplate::new(intent, &text)?]),
        RawEntry::Choices(choices) => choices
            .into_iter()
            .map(|choice| build_choice(intent, choice, Classification::Plain, None))
            .collect(),
        RawEntry::Detailed(detailed) => {
            let classification = Classification::from_flags(
                intent,
                is_set(detailed.prefix.as_ref()),
                is_set(detailed.suffix.as_ref()),
                is_set(detailed.conjunction.as_ref()),
            )?;
            let condition = detailed.condition.as_deref();
            match (detailed.text, detailed.choices) {
                (Some(text), None) => Ok(vec![build_choice(
                    intent,
                    RawChoice::Text(text),
                    classification,
                    condition,
                )?]),
                (None, Some(choices)) if !choices.is_empty() => choices
                    .into_iter()
                    .map(|choice| build_choice(intent, choice, classification, condition))
                    .collect(),
                (Some(_), Some(_)) => Err(TemplateError::Load {
                    source: source.to_string(),
                    reason: format!("intent '{intent}' has both text and choices"),
                }),
                (None, _) => Err(TemplateError::EmptyTemplate {
                    intent: normalize_intent(intent),
                }),
            }
        }
    }
}

impl TemplateBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate after the existing ones for its intent.
    pub fn insert(&mut self, template: ResponseTemplate) {
        self.templates
            .entry(template.intent().to_string())
            .or_default()
            .push(Arc::new(template));
    }

    /// Adds all candidates of another bank.
    pub fn merge(&mut self, other: TemplateBank) {
        for (intent, mut templates) in other.templates {
            self.templates.entry(intent).or_default().append(&mut templates);
        }
    }

    /// Parses a YAML document. `source` names the document in errors.
    ///
    /// # Errors
    ///
    /// Returns `Load` for malformed YAML and the template errors of
    /// individual definitions.
    pub fn from_yaml_str(source: &str, yaml: &str) -> Result<Self, TemplateError> {
        let raw: BTreeMap<String, RawEntry> =
            serde_yaml::from_str(yaml).map_err(|e| TemplateError::Load {
                source: source.to_string(),
                reason: e.to_string(),
            })?;
        let mut bank = Self::new();
        for (intent, entry) in raw {
            for template in build_entry(source, &intent, entry)? {
                bank.insert(template);
            }
        }
        debug!(source, intents = bank.templates.len(), "Parsed response templates");
        Ok(bank)
    }

    /// Loads one YAML file.
    ///
    /// # Errors
    ///
    /// As [`from_yaml_str`](Self::from_yaml_str), plus `Load` when the file
    /// cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, TemplateError> {
        let source = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|e| TemplateError::Load {
            source: source.clone(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&source, &yaml)
    }

    /// Loads every `.yml`/`.yaml` file of a directory in file name order.
    ///
    /// # Errors
    ///
    /// Returns the first error of any file.
    pub fn load_dir(dir: &Path) -> Result<Self, TemplateError> {
        let load_error = |e: std::io::Error| TemplateError::Load {
            source: dir.display().to_string(),
            reason: e.to_string(),
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(load_error)? {
            let path = entry.map_err(load_error)?.path();
            if path.is_file()
                && let Some(ext) = path.extension().and_then(|e| e.to_str())
                && matches!(ext, "yml" | "yaml")
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut bank = Self::new();
        for path in &paths {
            bank.merge(Self::from_path(path)?);
        }
        info!(
            dir = %dir.display(),
            files = paths.len(),
            intents = bank.templates.len(),
            "Loaded response templates"
        );
        Ok(bank)
    }

    /// Known intents, sorted.
    #[must_use]
    pub fn intents(&self) -> Vec<&str> {
        let mut intents: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        intents.sort_unstable();
        intents
    }

    /// Number of intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateProvider for TemplateBank {
    fn candidates(&self, intent: &str) -> &[Arc<ResponseTemplate>] {
        self.templates
            .get(&normalize_intent(intent))
            .map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const YAML: &str = r#"
hello: Hallo!
What I can do:
  - Ich helfe bei Ihrem Schadensfall.
  - text: Machen wir weiter?
    condition: has_answered_questions
sorry:
  prefix: yes
  choices:
    - Das tut mir leid,
    - Entschuldigung,
thanks:
  is_suffix: true
  text: danke!
"#;

    fn texts(bank: &TemplateBank, intent: &str) -> Vec<String> {
        bank.candidates(intent)
            .iter()
            .map(|t| t.text().to_string())
            .collect()
    }

    #[test]
    fn all_entry_shapes_load() {
        let bank = TemplateBank::from_yaml_str("inline", YAML).expect("valid");
        assert_eq!(bank.intents(), vec!["hello", "sorry", "thanks", "what_i_can_do"]);
        assert_eq!(texts(&bank, "hello"), vec!["Hallo!"]);
        assert_eq!(
            texts(&bank, "what i can do"),
            vec!["Ich helfe bei Ihrem Schadensfall.", "Machen wir weiter?"]
        );
        let conditions: Vec<_> = bank
            .candidates("what_i_can_do")
            .iter()
            .map(|t| t.condition().map(str::to_string))
            .collect();
        assert_eq!(conditions, vec![None, Some("has_answered_questions".to_string())]);
    }

    #[test]
    fn flags_apply_to_all_choices() {
        let bank = TemplateBank::from_yaml_str("inline", YAML).expect("valid");
        assert!(bank.candidates("sorry").iter().all(|t| t.is_prefix()));
        assert!(bank.candidates("thanks")[0].is_suffix());
        assert!(!bank.candidates("hello")[0].is_prefix());
    }

    #[test]
    fn unknown_intents_have_no_candidates() {
        let bank = TemplateBank::from_yaml_str("inline", YAML).expect("valid");
        assert!(bank.candidates("goodbye").is_empty());
        assert!(!bank.contains("goodbye"));
    }

    #[test]
    fn conflicting_flags_fail_the_load() {
        let yaml = "bad:\n  prefix: yes\n  suffix: yes\n  text: x\n";
        assert!(matches!(
            TemplateBank::from_yaml_str("inline", yaml),
            Err(TemplateError::ConflictingClassification { .. })
        ));
    }

    #[test]
    fn empty_definitions_fail_the_load() {
        assert!(matches!(
            TemplateBank::from_yaml_str("inline", "bad: ''\n"),
            Err(TemplateError::EmptyTemplate { .. })
        ));
        assert!(matches!(
            TemplateBank::from_yaml_str("inline", "bad:\n  prefix: yes\n"),
            Err(TemplateError::EmptyTemplate { .. })
        ));
        assert!(matches!(
            TemplateBank::from_yaml_str("inline", "- not a mapping\n"),
            Err(TemplateError::Load { .. })
        ));
    }

    #[test]
    fn directories_merge_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut first = std::fs::File::create(dir.path().join("a.yml")).expect("create");
        writeln!(first, "hello: Hallo!").expect("write");
        let mut second = std::fs::File::create(dir.path().join("b.yaml")).expect("create");
        writeln!(second, "hello: Guten Tag!\nbye: Tschüss!").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored: yes").expect("write");

        let bank = TemplateBank::load_dir(dir.path()).expect("loads");
        assert_eq!(bank.len(), 2);
        assert_eq!(texts(&bank, "hello"), vec!["Hallo!", "Guten Tag!"]);
    }
}
