use crate::bank::TemplateProvider;
use crate::environment::TemplateEnvironment;
use crate::error::TemplateError;
use crate::render::render_str;
use crate::selector::TemplateSelector;
use crate::template::ResponseTemplate;
use parlance_core::normalize_intent;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Selects and renders templates for one turn.
///
/// Candidates are filtered by their conditions against the environment
/// before the selector picks one.
pub struct SelectiveTemplateLoader {
    provider: Arc<dyn TemplateProvider>,
    selector: Box<dyn TemplateSelector>,
    environment: TemplateEnvironment,
}

impl fmt::Debug for SelectiveTemplateLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectiveTemplateLoader")
            .field("selector", &self.selector)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl SelectiveTemplateLoader {
    #[must_use]
    pub fn new(
        provider: Arc<dyn TemplateProvider>,
        selector: Box<dyn TemplateSelector>,
        environment: TemplateEnvironment,
    ) -> Self {
        Self {
            provider,
            selector,
            environment,
        }
    }

    #[must_use]
    pub fn environment(&self) -> &TemplateEnvironment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut TemplateEnvironment {
        &mut self.environment
    }

    #[must_use]
    pub fn selector(&self) -> &dyn TemplateSelector {
        self.selector.as_ref()
    }

    /// Whether any template exists for the intent, regardless of conditions.
    #[must_use]
    pub fn knows(&self, intent: &str) -> bool {
        self.provider.contains(intent)
    }

    /// Picks a template whose condition holds.
    ///
    /// # Errors
    ///
    /// Returns `NoViableTemplate` when the intent is unknown or every
    /// candidate's condition fails.
    pub fn select(&mut self, intent: &str) -> Result<Arc<ResponseTemplate>, TemplateError> {
        let candidates = self.provider.candidates(intent);
        let viable: Vec<Arc<ResponseTemplate>> = candidates
            .iter()
            .filter(|t| t.check_condition(&self.environment))
            .cloned()
            .collect();
        let no_viable = || TemplateError::NoViableTemplate {
            intent: normalize_intent(intent),
            candidates: candidates.len(),
        };
        if viable.is_empty() {
            warn!(intent, candidates = candidates.len(), "No viable template");
            return Err(no_viable());
        }
        let chosen = self.selector.select(&viable).ok_or_else(no_viable)?;
        debug!(
            intent,
            viable = viable.len(),
            classification = %chosen.classification(),
            "Selected template"
        );
        Ok(chosen)
    }

    /// Selects a template and renders it with `parameters` over the environment.
    ///
    /// # Errors
    ///
    /// As [`select`](Self::select), plus `Render` failures.
    pub fn render(
        &mut self,
        intent: &str,
        parameters: &BTreeMap<String, JsonValue>,
    ) -> Result<(Arc<ResponseTemplate>, String), TemplateError> {
        let template = self.select(intent)?;
        let text = template.render(&self.environment.layered(parameters))?;
        Ok((template, text))
    }

    /// Renders a literal string as a one-off template.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` or `Render` failures.
    pub fn render_literal(
        &self,
        text: &str,
        parameters: &BTreeMap<String, JsonValue>,
    ) -> Result<String, TemplateError> {
        render_str(text, &self.environment.layered(parameters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::TemplateBank;
    use crate::selector::LeastRecentlyUsed;
    use serde_json::json;

    const YAML: &str = r#"
greeting:
  - text: "Hallo {{ name }}!"
  - text: Schön, dass Sie wieder da sind.
    condition: returning
farewell:
  - text: Bis bald!
    condition: "false"
"#;

    fn build_loader(returning: bool) -> SelectiveTemplateLoader {
        let bank = TemplateBank::from_yaml_str("inline", YAML).expect("valid");
        SelectiveTemplateLoader::new(
            Arc::new(bank),
            Box::new(LeastRecentlyUsed::new()),
            TemplateEnvironment::new().with_variable("returning", returning),
        )
    }

    #[test]
    fn conditions_filter_before_selection() {
        let mut loader = build_loader(false);
        for _ in 0..3 {
            assert_eq!(loader.select("greeting").expect("viable").text(), "Hallo {{ name }}!");
        }
        let mut loader = build_loader(true);
        let first = loader.select("greeting").expect("viable");
        let second = loader.select("greeting").expect("viable");
        assert_ne!(first.text(), second.text());
    }

    #[test]
    fn unknown_and_filtered_intents_are_not_viable() {
        let mut loader = build_loader(false);
        assert_eq!(
            loader.select("unknown").expect_err("unknown"),
            TemplateError::NoViableTemplate {
                intent: "unknown".to_string(),
                candidates: 0
            }
        );
        assert_eq!(
            loader.select("farewell").expect_err("filtered"),
            TemplateError::NoViableTemplate {
                intent: "farewell".to_string(),
                candidates: 1
            }
        );
        assert!(loader.knows("farewell"));
    }

    #[test]
    fn parameters_reach_the_rendered_text() {
        let mut loader = build_loader(false);
        let params = BTreeMap::from([("name".to_string(), json!("Ada"))]);
        let (_, text) = loader.render("greeting", &params).expect("renders");
        assert_eq!(text, "Hallo Ada!");
        let literal = loader
            .render_literal("{{ name | upper }}?", &params)
            .expect("renders");
        assert_eq!(literal, "ADA?");
    }

    #[test]
    fn usage_is_exposed_for_persistence() {
        let mut loader = build_loader(false);
        loader.select("greeting").expect("viable");
        let usage = loader.selector().usage().expect("lru keeps usage");
        assert_eq!(usage.get("Hallo {{ name }}!"), Some(&1));
    }
}
