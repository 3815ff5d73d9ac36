//! Wiring the claim bot for the terminal.

use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::nlu::KeywordNlu;
use parlance_claims::{INITIAL, questionnaire_catalog, router, template_bank, validators};
use parlance_conversation::{InMemoryAnswerStore, QuestionnaireCatalog};
use parlance_core::User;
use parlance_dialog::{BotClient, ContextManager, DialogManager, PlanningAgent, Update};
use parlance_templates::TemplateBank;
use rootcause::Report;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `/start` opens the conversation again.
    Start,
    /// Plain text, or the choice picked by its number.
    Text(String),
    /// `/photo <path>` sends a file.
    Media(String),
    /// `/quit` or `/exit`.
    Quit,
    Empty,
}

impl Input {
    /// The update this input produces for the user, if any.
    #[must_use]
    pub fn into_update(self, user: &User) -> Option<Update> {
        match self {
            Self::Start => Some(Update::start(user.clone())),
            Self::Text(text) => Some(Update::text(user.clone(), text)),
            Self::Media(location) => Some(Update::media(user.clone(), location)),
            Self::Quit | Self::Empty => None,
        }
    }
}

/// Parses a line. A bare number picks from `choices`, counting from one.
#[must_use]
pub fn parse_input(line: &str, choices: &[String]) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    match line {
        "/quit" | "/exit" => return Input::Quit,
        "/start" => return Input::Start,
        _ => {}
    }
    if let Some(location) = line.strip_prefix("/photo") {
        let location = location.trim();
        if !location.is_empty() {
            return Input::Media(location.to_string());
        }
    }
    if let Ok(n) = line.parse::<usize>()
        && let Some(choice) = n.checked_sub(1).and_then(|i| choices.get(i))
    {
        return Input::Text(choice.clone());
    }
    Input::Text(line.to_string())
}

fn asset_error(asset: &'static str) -> impl Fn(String) -> ConsoleError {
    move |reason| ConsoleError::Assets { asset, reason }
}

fn load_templates(path: Option<&Path>) -> Result<TemplateBank, ConsoleError> {
    let bank = match path {
        Some(dir) if dir.is_dir() => TemplateBank::load_dir(dir),
        Some(file) => TemplateBank::from_path(file),
        None => template_bank(),
    };
    bank.map_err(|e| e.to_string()).map_err(asset_error("templates"))
}

fn load_questionnaires(path: Option<&Path>) -> Result<QuestionnaireCatalog, ConsoleError> {
    let catalog = match path {
        Some(file) => QuestionnaireCatalog::from_path(file, &validators::registry()),
        None => questionnaire_catalog(),
    };
    catalog
        .map_err(|e| e.to_string())
        .map_err(asset_error("questionnaires"))
}

fn load_intents(path: Option<&Path>) -> Result<KeywordNlu, ConsoleError> {
    let nlu = match path {
        Some(file) => KeywordNlu::from_path(file),
        None => KeywordNlu::bundled(),
    };
    nlu.map_err(|e| e.to_string()).map_err(asset_error("intents"))
}

/// Loads every asset and assembles a dialog manager talking through `bot`.
///
/// # Errors
///
/// Returns `Assets` if templates, questionnaires, intent rules or the rule
/// table fail to load.
pub fn build_manager(config: &ConsoleConfig, bot: Arc<dyn BotClient>) -> Result<DialogManager, Report<ConsoleError>> {
    let assets = &config.assets;
    let templates = load_templates(assets.templates.as_deref())?;
    let questionnaires = load_questionnaires(assets.questionnaires.as_deref())?;
    let nlu = load_intents(assets.intents.as_deref())?;
    let router = router()
        .map_err(|e| e.to_string())
        .map_err(asset_error("rules"))?;
    info!(
        intents = templates.len(),
        questions = questionnaires.total_questions(),
        intent_rules = nlu.len(),
        "Loaded assets"
    );

    let agent = PlanningAgent::new(Arc::new(router), Arc::new(templates), config.dialog.clone());
    let contexts = ContextManager::new(Arc::new(questionnaires), Arc::new(InMemoryAnswerStore::new()), INITIAL)
        .with_lookup_recency(config.dialog.lookup_recency);
    Ok(DialogManager::new(agent, Arc::new(contexts), bot, Arc::new(nlu)))
}
