//! Three-tier rule matching.
//!
//! 1. Stateless handlers: every match runs, whatever the dialog state.
//! 2. State handlers: the first match under the highest-priority state that
//!    has one.
//! 3. Fallbacks: the first match, when no state handler applied.

use crate::handler::Handler;
use parlance_conversation::{MessageUnderstanding, State};
use std::collections::HashMap;
use tracing::warn;

/// Declarative rules, consumed by [`Router::new`].
#[derive(Debug, Default, Clone)]
pub struct RuleTable {
    stateless: Vec<Handler>,
    states: Vec<(State, Vec<Handler>)>,
    fallbacks: Vec<Handler>,
}

impl RuleTable {
    /// Creates an empty rule table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler checked on every turn, whatever the state.
    #[must_use]
    pub fn stateless(mut self, handler: Handler) -> Self {
        self.stateless.push(handler);
        self
    }

    /// Adds handlers for a state, after any already registered for it.
    #[must_use]
    pub fn state(mut self, state: impl Into<State>, handlers: impl IntoIterator<Item = Handler>) -> Self {
        self.states.push((state.into(), handlers.into_iter().collect()));
        self
    }

    /// Adds a handler tried when no state handler matches.
    #[must_use]
    pub fn fallback(mut self, handler: Handler) -> Self {
        self.fallbacks.push(handler);
        self
    }

    /// Adds several fallback handlers in order.
    #[must_use]
    pub fn fallbacks(mut self, handlers: impl IntoIterator<Item = Handler>) -> Self {
        self.fallbacks.extend(handlers);
        self
    }
}

/// Read-only rule lookup built once at startup.
#[derive(Debug, Clone)]
pub struct Router {
    stateless: Vec<Handler>,
    states: HashMap<State, Vec<Handler>>,
    fallbacks: Vec<Handler>,
}

impl Router {
    /// Builds the router, merging handlers registered for the same state.
    #[must_use]
    pub fn new(table: RuleTable) -> Self {
        let mut states: HashMap<State, Vec<Handler>> = HashMap::new();
        for (state, handlers) in table.states {
            states.entry(state).or_default().extend(handlers);
        }
        if !table.fallbacks.iter().any(|h| h.trigger().is_universal()) {
            warn!("No universal fallback handler registered; unmatched messages will get no rule");
        }
        Self {
            stateless: table.stateless,
            states,
            fallbacks: table.fallbacks,
        }
    }

    /// Every stateless handler that matches, in declaration order.
    pub fn iter_stateless_matches<'a>(
        &'a self,
        understanding: &'a MessageUnderstanding,
    ) -> impl Iterator<Item = &'a Handler> + 'a {
        self.stateless.iter().filter(move |h| h.matches(understanding))
    }

    /// The first handler of `state` that matches.
    #[must_use]
    pub fn find_matching_state_handler(
        &self,
        state: &State,
        understanding: &MessageUnderstanding,
    ) -> Option<&Handler> {
        self.states
            .get(state)?
            .iter()
            .find(|h| h.matches(understanding))
    }

    /// The first fallback that matches.
    #[must_use]
    pub fn get_fallback_handler(&self, understanding: &MessageUnderstanding) -> Option<&Handler> {
        self.fallbacks.iter().find(|h| h.matches(understanding))
    }

    /// States that have handlers.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.keys()
    }

    /// Total number of handlers in all tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stateless.len() + self.states.values().map(Vec::len).sum::<usize>() + self.fallbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Outcome, Trigger};

    fn handler(name: &str, trigger: Trigger) -> Handler {
        Handler::new(name, trigger, |_, _| Ok(Outcome::Stay))
    }

    fn router() -> Router {
        Router::new(
            RuleTable::new()
                .stateless(handler("log_damage", Trigger::intent("phone_broken")))
                .stateless(handler("address", Trigger::any_intent()))
                .state(
                    "smalltalk",
                    [
                        handler("start", Trigger::intents(["start", "hello"])),
                        handler("greeting", Trigger::intent("hello")),
                    ],
                )
                .state(("asking", "how_are_you"), [handler("feeling", Trigger::parameters(["feeling"]))])
                .state("smalltalk", [handler("ask_to_start", Trigger::intent("phone_broken"))])
                .fallback(handler("intro", Trigger::intent("what_can_you_do")))
                .fallback(handler("no_rule_found", Trigger::any_intent())),
        )
    }

    fn names<'a>(handlers: impl Iterator<Item = &'a Handler>) -> Vec<&'a str> {
        handlers.map(Handler::name).collect()
    }

    #[test]
    fn all_matching_stateless_handlers_are_yielded() {
        let router = router();
        let u = MessageUnderstanding::new("Handy kaputt", "phone_broken");
        assert_eq!(names(router.iter_stateless_matches(&u)), vec!["log_damage", "address"]);
    }

    #[test]
    fn first_state_handler_wins() {
        let router = router();
        let u = MessageUnderstanding::new("Hallo", "hello");
        let found = router.find_matching_state_handler(&State::named("smalltalk"), &u);
        assert_eq!(found.map(Handler::name), Some("start"));
    }

    #[test]
    fn repeated_states_extend_their_bucket() {
        let router = router();
        let u = MessageUnderstanding::new("Handy kaputt", "phone_broken");
        let found = router.find_matching_state_handler(&State::named("smalltalk"), &u);
        assert_eq!(found.map(Handler::name), Some("ask_to_start"));
        assert_eq!(router.len(), 8);
    }

    #[test]
    fn composite_states_are_looked_up_as_a_whole() {
        let router = router();
        let u = MessageUnderstanding::new("gut", "x").with_parameter("feeling", "good");
        let state = State::composite(["asking", "how_are_you"]);
        assert_eq!(
            router.find_matching_state_handler(&state, &u).map(Handler::name),
            Some("feeling")
        );
        assert!(router.find_matching_state_handler(&State::named("asking"), &u).is_none());
    }

    #[test]
    fn fallbacks_are_tried_in_order() {
        let router = router();
        let intro = MessageUnderstanding::new("Was kannst du?", "what_can_you_do");
        assert_eq!(router.get_fallback_handler(&intro).map(Handler::name), Some("intro"));
        let other = MessageUnderstanding::new("Blub", "unknown");
        assert_eq!(router.get_fallback_handler(&other).map(Handler::name), Some("no_rule_found"));
    }
}
