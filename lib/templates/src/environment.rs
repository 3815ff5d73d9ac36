//! The variables and functions templates can see.

use crate::error::ExpressionError;
use crate::expression::Scope;
use crate::pronoun::{Case, Gender, PronounKind, pronoun};
use parlance_core::normalize_intent;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Default number of utterances the recency functions look back.
pub const DEFAULT_RECENCY: usize = 15;

/// Intents of recent utterances, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentIntents {
    user: Vec<String>,
    bot: Vec<Vec<String>>,
}

impl RecentIntents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the intent of the next older user utterance.
    pub fn push_user(&mut self, intent: &str) {
        self.user.push(normalize_intent(intent));
    }

    /// Appends the intents of the next older bot action.
    pub fn push_bot<I, S>(&mut self, intents: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bot
            .push(intents.into_iter().map(|i| normalize_intent(i.as_ref())).collect());
    }

    /// Whether one of the latest `age + 1` user utterances had the intent.
    #[must_use]
    pub fn user_recent(&self, intent: &str, age: usize) -> bool {
        let intent = normalize_intent(intent);
        self.user.iter().take(age.saturating_add(1)).any(|i| *i == intent)
    }

    /// Whether one of the latest `age + 1` bot actions carried the intent.
    #[must_use]
    pub fn bot_recent(&self, intent: &str, age: usize) -> bool {
        let intent = normalize_intent(intent);
        self.bot
            .iter()
            .take(age.saturating_add(1))
            .any(|intents| intents.contains(&intent))
    }
}

/// Template environment for one turn.
#[derive(Debug, Clone)]
pub struct TemplateEnvironment {
    variables: BTreeMap<String, JsonValue>,
    formal_address: bool,
    recent: RecentIntents,
    recency: usize,
}

impl Default for TemplateEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self {
            variables: BTreeMap::new(),
            formal_address: true,
            recent: RecentIntents::new(),
            recency: DEFAULT_RECENCY,
        }
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set_variable(name, value);
        self
    }

    #[must_use]
    pub fn with_formal_address(mut self, formal: bool) -> Self {
        self.formal_address = formal;
        self
    }

    #[must_use]
    pub fn with_recent_intents(mut self, recent: RecentIntents) -> Self {
        self.recent = recent;
        self
    }

    /// Sets how far `user_recent`/`bot_recent` look back without an explicit age.
    #[must_use]
    pub fn with_recency(mut self, recency: usize) -> Self {
        self.recency = recency;
        self
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.variables.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn variables(&self) -> &BTreeMap<String, JsonValue> {
        &self.variables
    }

    #[must_use]
    pub fn formal_address(&self) -> bool {
        self.formal_address
    }

    #[must_use]
    pub fn recent_intents(&self) -> &RecentIntents {
        &self.recent
    }

    /// A scope where `parameters` shadow the environment's variables.
    #[must_use]
    pub fn layered<'a>(&'a self, parameters: &'a BTreeMap<String, JsonValue>) -> Layered<'a> {
        Layered {
            parameters,
            base: self,
        }
    }

    fn recency_call(&self, name: &str, args: &[JsonValue]) -> Result<(String, usize), ExpressionError> {
        let arity = || ExpressionError::Arity {
            function: name.to_string(),
            expected: "1 or 2".to_string(),
            found: args.len(),
        };
        let (intent, age) = match args {
            [intent] => (intent, None),
            [intent, age] => (intent, Some(age)),
            _ => return Err(arity()),
        };
        let intent = string_arg(name, intent)?;
        let age = match age {
            None => self.recency,
            Some(age) => age
                .as_u64()
                .and_then(|a| usize::try_from(a).ok())
                .ok_or_else(|| ExpressionError::Type {
                    message: format!("{name} expects a non-negative age, got {age}"),
                })?,
        };
        Ok((intent, age))
    }

    fn pronoun_call(&self, args: &[JsonValue]) -> Result<JsonValue, ExpressionError> {
        let (kind, case, gender) = match args {
            [kind, case] => (kind, case, None),
            [kind, case, gender] => (kind, case, Some(gender)),
            _ => {
                return Err(ExpressionError::Arity {
                    function: "pronoun".to_string(),
                    expected: "2 or 3".to_string(),
                    found: args.len(),
                });
            }
        };
        let parse_error = |message: String| ExpressionError::Type { message };
        let kind: PronounKind = string_arg("pronoun", kind)?.parse().map_err(parse_error)?;
        let case: Case = string_arg("pronoun", case)?.parse().map_err(parse_error)?;
        let gender = match gender {
            Some(g) => Some(string_arg("pronoun", g)?.parse::<Gender>().map_err(parse_error)?),
            None => None,
        };
        pronoun(self.formal_address, kind, case, gender)
            .map(JsonValue::String)
            .ok_or_else(|| ExpressionError::Type {
                message: "possessive pronouns need a gender".to_string(),
            })
    }
}

fn string_arg(function: &str, value: &JsonValue) -> Result<String, ExpressionError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ExpressionError::Type {
            message: format!("{function} expects a string, got {value}"),
        })
}

impl Scope for TemplateEnvironment {
    fn variable(&self, name: &str) -> Option<JsonValue> {
        match self.variables.get(name) {
            Some(value) => Some(value.clone()),
            None if name == "formal_address" => Some(JsonValue::Bool(self.formal_address)),
            None => None,
        }
    }

    fn call(&self, name: &str, args: &[JsonValue]) -> Result<JsonValue, ExpressionError> {
        match name {
            "user_recent" => {
                let (intent, age) = self.recency_call(name, args)?;
                Ok(JsonValue::Bool(self.recent.user_recent(&intent, age)))
            }
            "bot_recent" => {
                let (intent, age) = self.recency_call(name, args)?;
                Ok(JsonValue::Bool(self.recent.bot_recent(&intent, age)))
            }
            "pronoun" => self.pronoun_call(args),
            _ => Err(ExpressionError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }
}

/// Action parameters layered over a [`TemplateEnvironment`].
#[derive(Debug, Clone, Copy)]
pub struct Layered<'a> {
    parameters: &'a BTreeMap<String, JsonValue>,
    base: &'a TemplateEnvironment,
}

impl Scope for Layered<'_> {
    fn variable(&self, name: &str) -> Option<JsonValue> {
        self.parameters
            .get(name)
            .cloned()
            .or_else(|| self.base.variable(name))
    }

    fn call(&self, name: &str, args: &[JsonValue]) -> Result<JsonValue, ExpressionError> {
        self.base.call(name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expr;
    use serde_json::json;

    fn eval(scope: &dyn Scope, source: &str) -> JsonValue {
        Expr::parse(source)
            .and_then(|expr| expr.eval(scope))
            .unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    fn environment() -> TemplateEnvironment {
        let mut recent = RecentIntents::new();
        recent.push_user("how are you");
        recent.push_user("hello");
        recent.push_bot(["greeting"]);
        recent.push_bot(["smalltalk", "joke"]);
        TemplateEnvironment::new()
            .with_variable("questionnaire_completion", 0.5)
            .with_formal_address(false)
            .with_recent_intents(recent)
    }

    #[test]
    fn recency_functions_respect_age() {
        let env = environment();
        assert_eq!(eval(&env, "user_recent('hello')"), json!(true));
        assert_eq!(eval(&env, "user_recent('hello', 0)"), json!(false));
        assert_eq!(eval(&env, "user_recent('how_are_you', 0)"), json!(true));
        assert_eq!(eval(&env, "bot_recent('joke', 1)"), json!(true));
        assert_eq!(eval(&env, "not bot_recent('joke', 0)"), json!(true));
    }

    #[test]
    fn recency_functions_check_arguments() {
        let env = environment();
        let err = Expr::parse("user_recent()").and_then(|e| e.eval(&env)).expect_err("arity");
        assert!(matches!(err, ExpressionError::Arity { .. }));
        let err = Expr::parse("user_recent('x', -1)").and_then(|e| e.eval(&env)).expect_err("age");
        assert!(matches!(err, ExpressionError::Type { .. }));
    }

    #[test]
    fn pronouns_follow_the_address_setting() {
        let env = environment();
        assert_eq!(eval(&env, "pronoun('personal', 'dative')"), json!("dir"));
        let formal = env.clone().with_formal_address(true);
        assert_eq!(eval(&formal, "pronoun('possessive', 'nominative', 'feminine')"), json!("Ihre"));
        assert_eq!(eval(&formal, "formal_address"), json!(true));
        let err = Expr::parse("pronoun('possessive', 'dative')")
            .and_then(|e| e.eval(&formal))
            .expect_err("gender");
        assert!(err.to_string().contains("need a gender"));
    }

    #[test]
    fn parameters_shadow_variables() {
        let env = environment();
        let mut params = BTreeMap::new();
        params.insert("questionnaire_completion".to_string(), json!(1));
        let layered = env.layered(&params);
        assert_eq!(eval(&layered, "questionnaire_completion"), json!(1));
        assert_eq!(eval(&env, "questionnaire_completion"), json!(0.5));
        assert_eq!(eval(&layered, "user_recent('hello')"), json!(true));
    }
}
