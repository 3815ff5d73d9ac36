//! A German-speaking bot that takes phone damage claims.
//!
//! The bot chats, offers to file a claim and walks the user through the
//! device, damage and contact questionnaires. Templates and questionnaires
//! ship with the crate; [`router`] wires up the rules.
//!
//! ```no_run
//! use parlance_claims::{questionnaire_catalog, router, template_bank};
//!
//! let router = router().expect("patterns compile");
//! let templates = template_bank().expect("bundled templates parse");
//! let questionnaires = questionnaire_catalog().expect("bundled questionnaires parse");
//! ```

pub mod admin;
pub mod claim;
pub mod rules;
pub mod smalltalk;
pub mod states;
pub mod validators;

pub use rules::{router, rule_table};
pub use states::INITIAL;

use parlance_conversation::{QuestionnaireCatalog, QuestionnaireError};
use parlance_templates::{TemplateBank, TemplateError};

/// Bundled response templates.
pub const TEMPLATES: &str = include_str!("../assets/templates.yaml");

/// Bundled questionnaires.
pub const QUESTIONNAIRES: &str = include_str!("../assets/questionnaires.yaml");

/// Parses the bundled templates.
///
/// # Errors
///
/// Returns an error if the bundled YAML is invalid.
pub fn template_bank() -> Result<TemplateBank, TemplateError> {
    TemplateBank::from_yaml_str("templates.yaml", TEMPLATES)
}

/// Parses the bundled questionnaires with the claim validators.
///
/// # Errors
///
/// Returns an error if the bundled YAML is invalid.
pub fn questionnaire_catalog() -> Result<QuestionnaireCatalog, QuestionnaireError> {
    QuestionnaireCatalog::from_yaml_str(QUESTIONNAIRES, &validators::registry())
}
