//! Named answer validators.
//!
//! Questions refer to validators by name in their definition. The names are
//! resolved against a [`ValidatorRegistry`] once, while loading the
//! questionnaires, so an unknown name fails the load instead of a turn.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Checks and normalizes a free-text answer.
pub trait AnswerValidator: fmt::Debug + Send + Sync {
    /// The name questions use to refer to this validator.
    fn name(&self) -> &str;

    /// Returns the normalized answer, or `None` when the answer is invalid.
    fn validate(&self, answer: &str) -> Option<String>;
}

type ValidateFn = dyn Fn(&str) -> Option<String> + Send + Sync;

/// A validator backed by a closure.
#[derive(Clone)]
pub struct FnValidator {
    name: String,
    check: Arc<ValidateFn>,
}

impl FnValidator {
    /// Wraps a closure under a name.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for FnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator").field("name", &self.name).finish()
    }
}

impl AnswerValidator for FnValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, answer: &str) -> Option<String> {
        (self.check)(answer)
    }
}

/// Registry of validators available to questionnaire definitions.
#[derive(Debug, Default, Clone)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn AnswerValidator>>,
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Registers a validator under its own name, replacing any previous one.
    pub fn register(&mut self, validator: impl AnswerValidator + 'static) {
        self.validators
            .insert(validator.name().to_string(), Arc::new(validator));
    }

    /// Registers a closure as a validator.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.register(FnValidator::new(name, check));
    }

    /// Looks up a validator.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn AnswerValidator>> {
        self.validators.get(name).cloned()
    }

    /// Returns the registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// Returns the number of registered validators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
