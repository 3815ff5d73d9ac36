//! Strategies for picking one of several viable templates.

use crate::template::ResponseTemplate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Picks one template out of the viable candidates.
pub trait TemplateSelector: fmt::Debug + Send {
    /// Returns `None` only for an empty slice.
    fn select(&mut self, candidates: &[Arc<ResponseTemplate>]) -> Option<Arc<ResponseTemplate>>;

    /// Usage counters to persist between turns, if the strategy keeps any.
    fn usage(&self) -> Option<&HashMap<String, u64>> {
        None
    }
}

/// Uniform random choice.
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible choices for tests and replays.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSelector").finish_non_exhaustive()
    }
}

impl TemplateSelector for RandomSelector {
    fn select(&mut self, candidates: &[Arc<ResponseTemplate>]) -> Option<Arc<ResponseTemplate>> {
        candidates.choose(&mut self.rng).cloned()
    }
}

/// Picks the template used least often so far, keyed by template text.
///
/// Ties go to the earliest declared candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeastRecentlyUsed {
    usage: HashMap<String, u64>,
}

impl LeastRecentlyUsed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from persisted counters.
    #[must_use]
    pub fn from_usage(usage: HashMap<String, u64>) -> Self {
        Self { usage }
    }

    #[must_use]
    pub fn count(&self, text: &str) -> u64 {
        self.usage.get(text).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn into_usage(self) -> HashMap<String, u64> {
        self.usage
    }
}

impl TemplateSelector for LeastRecentlyUsed {
    fn select(&mut self, candidates: &[Arc<ResponseTemplate>]) -> Option<Arc<ResponseTemplate>> {
        let chosen = candidates.iter().min_by_key(|t| self.count(t.text()))?.clone();
        *self.usage.entry(chosen.text().to_string()).or_insert(0) += 1;
        Some(chosen)
    }

    fn usage(&self) -> Option<&HashMap<String, u64>> {
        Some(&self.usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(texts: &[&str]) -> Vec<Arc<ResponseTemplate>> {
        texts
            .iter()
            .map(|text| Arc::new(ResponseTemplate::new("greeting", text).expect("valid")))
            .collect()
    }

    #[test]
    fn least_used_template_wins_and_is_counted() {
        let templates = candidates(&["T1", "T2", "T3"]);
        let usage = HashMap::from([
            ("T1".to_string(), 2),
            ("T2".to_string(), 0),
            ("T3".to_string(), 1),
        ]);
        let mut selector = LeastRecentlyUsed::from_usage(usage);

        let chosen = selector.select(&templates).expect("non-empty");
        assert_eq!(chosen.text(), "T2");
        assert_eq!(selector.count("T2"), 1);
    }

    #[test]
    fn ties_go_to_the_first_declared() {
        let templates = candidates(&["A", "B", "C"]);
        let mut selector = LeastRecentlyUsed::new();
        let picks: Vec<String> = (0..4)
            .map(|_| selector.select(&templates).expect("non-empty").text().to_string())
            .collect();
        assert_eq!(picks, vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn empty_candidates_select_nothing() {
        assert!(LeastRecentlyUsed::new().select(&[]).is_none());
        assert!(RandomSelector::seeded(7).select(&[]).is_none());
    }

    #[test]
    fn random_choices_stay_within_candidates() {
        let templates = candidates(&["A", "B"]);
        let mut selector = RandomSelector::seeded(42);
        for _ in 0..20 {
            let chosen = selector.select(&templates).expect("non-empty");
            assert!(["A", "B"].contains(&chosen.text()));
        }
        assert!(selector.usage().is_none());
    }
}
