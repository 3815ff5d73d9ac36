//! Dialog engine configuration.

use parlance_templates::{LeastRecentlyUsed, RandomSelector, TemplateSelector};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Settings of the planning agent and response composer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DialogConfig {
    /// How many utterances of each side recency lookups inspect.
    #[serde(default = "default_lookup_recency")]
    pub lookup_recency: usize,

    /// How one of several viable templates is chosen.
    #[serde(default)]
    pub template_selection: SelectionStrategy,

    /// What happens when no rule matches a message.
    #[serde(default)]
    pub no_rule_policy: NoRulePolicy,

    /// Reading delays between messages.
    #[serde(default)]
    pub pacing: PacingConfig,
}

fn default_lookup_recency() -> usize {
    15
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            lookup_recency: default_lookup_recency(),
            template_selection: SelectionStrategy::default(),
            no_rule_policy: NoRulePolicy::default(),
            pacing: PacingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    Random,
    #[default]
    LeastRecentlyUsed,
}

impl SelectionStrategy {
    /// Builds the selector, resuming least-recently-used counters from `usage`.
    #[must_use]
    pub fn selector(self, usage: HashMap<String, u64>) -> Box<dyn TemplateSelector> {
        match self {
            Self::Random => Box::new(RandomSelector::new()),
            Self::LeastRecentlyUsed => Box::new(LeastRecentlyUsed::from_usage(usage)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoRulePolicy {
    /// Send nothing and log a warning.
    Silent,
    /// Apologize for not understanding.
    #[default]
    Apologize,
}

/// Reading delay settings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PacingConfig {
    /// When disabled, every action without an explicit delay is sent at once.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_short_ms")]
    pub short_ms: u64,
    #[serde(default = "default_medium_ms")]
    pub medium_ms: u64,
    #[serde(default = "default_long_ms")]
    pub long_ms: u64,
    /// Upper bound of the length-based delay.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_per_char_ms")]
    pub per_char_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_short_ms() -> u64 {
    1300
}

fn default_medium_ms() -> u64 {
    1600
}

fn default_long_ms() -> u64 {
    1900
}

fn default_max_ms() -> u64 {
    3000
}

fn default_base_ms() -> u64 {
    350
}

fn default_per_char_ms() -> u64 {
    30
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            short_ms: default_short_ms(),
            medium_ms: default_medium_ms(),
            long_ms: default_long_ms(),
            max_ms: default_max_ms(),
            base_ms: default_base_ms(),
            per_char_ms: default_per_char_ms(),
        }
    }
}

impl PacingConfig {
    /// No delays at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Time a human would take to type a message of `chars` characters.
    #[must_use]
    pub fn natural_delay(&self, chars: usize) -> Duration {
        let chars = u64::try_from(chars).unwrap_or(u64::MAX);
        let millis = self
            .base_ms
            .saturating_add(self.per_char_ms.saturating_mul(chars))
            .min(self.max_ms);
        Duration::from_millis(millis)
    }

    /// Minimum delay of the action at `index` within one turn. The first
    /// action has none; later ones escalate short, medium, long.
    #[must_use]
    pub fn escalation(&self, index: usize) -> Duration {
        let millis = match index {
            0 => 0,
            1 => self.short_ms,
            2 => self.medium_ms,
            _ => self.long_ms,
        };
        Duration::from_millis(millis)
    }

    /// Delay of the action at `index` whose plain text has `chars` characters.
    #[must_use]
    pub fn delay_for(&self, index: usize, chars: usize) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        self.natural_delay(chars).max(self.escalation(index))
    }
}
