//! Persistence of questionnaire answers.
//!
//! The dialog engine only needs to record answers and to know which
//! questions already have one. Real deployments back this with a database;
//! [`InMemoryAnswerStore`] serves tests and the console.

use crate::error::AnswerStoreError;
use dashmap::DashMap;
use parlance_core::UserId;
use std::collections::{BTreeMap, BTreeSet};

/// Answer recorded for a skipped optional question.
pub const NO_ANSWER: &str = "No data";

/// Stores answers per user and question id.
pub trait AnswerStore: Send + Sync {
    /// Records an answer, replacing any earlier one for the same question.
    fn add_answer(
        &self,
        user: UserId,
        question_id: &str,
        answer: &str,
    ) -> Result<(), AnswerStoreError>;

    /// Ids of the questions the user has answered.
    fn answered_ids(&self, user: UserId) -> Result<BTreeSet<String>, AnswerStoreError>;

    /// All answers of the user, keyed by question id.
    fn answers(&self, user: UserId) -> Result<BTreeMap<String, String>, AnswerStoreError>;

    /// Forgets every answer of the user.
    fn clear_answers(&self, user: UserId) -> Result<(), AnswerStoreError>;
}

/// Answer store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAnswerStore {
    answers: DashMap<UserId, BTreeMap<String, String>>,
}

impl InMemoryAnswerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnswerStore for InMemoryAnswerStore {
    fn add_answer(
        &self,
        user: UserId,
        question_id: &str,
        answer: &str,
    ) -> Result<(), AnswerStoreError> {
        tracing::debug!(user_id = %user, question_id, "storing answer");
        self.answers
            .entry(user)
            .or_default()
            .insert(question_id.to_string(), answer.to_string());
        Ok(())
    }

    fn answered_ids(&self, user: UserId) -> Result<BTreeSet<String>, AnswerStoreError> {
        Ok(self
            .answers
            .get(&user)
            .map(|answers| answers.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn answers(&self, user: UserId) -> Result<BTreeMap<String, String>, AnswerStoreError> {
        Ok(self
            .answers
            .get(&user)
            .map(|answers| answers.value().clone())
            .unwrap_or_default())
    }

    fn clear_answers(&self, user: UserId) -> Result<(), AnswerStoreError> {
        self.answers.remove(&user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_are_scoped_per_user() {
        let store = InMemoryAnswerStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        store.add_answer(alice, "model", "Pixel").expect("stored");
        store.add_answer(bob, "imei", NO_ANSWER).expect("stored");

        let ids = store.answered_ids(alice).expect("readable");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), ["model"]);
        assert_eq!(
            store.answers(bob).expect("readable").get("imei").map(String::as_str),
            Some(NO_ANSWER)
        );
    }

    #[test]
    fn clearing_forgets_only_that_user() {
        let store = InMemoryAnswerStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        store.add_answer(alice, "model", "Pixel").expect("stored");
        store.add_answer(bob, "model", "iPhone").expect("stored");
        store.clear_answers(alice).expect("cleared");
        assert!(store.answered_ids(alice).expect("readable").is_empty());
        assert_eq!(store.answered_ids(bob).expect("readable").len(), 1);
    }
}
