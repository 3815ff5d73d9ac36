//! Dialog states: what the conversation is currently about.
//!
//! The queue holds `(state, lifetime)` entries ordered by priority, most
//! recently pushed first. A finite lifetime counts down once per turn; an
//! entry stays visible for exactly as many turns as its lifetime and is gone
//! on the next tick. The infinite-lifetime entry at the bottom is the floor
//! the conversation falls back to once everything above it has expired.
//! Pushing a new infinite state replaces the whole queue, so there is only
//! ever one floor.

use crate::error::DialogStateError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A state the router dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum State {
    /// A single atom, e.g. `asking_question`.
    Named(String),
    /// A compound state, e.g. `asking` + `how_are_you`.
    Composite(Vec<String>),
}

impl State {
    /// Creates a named state.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Creates a compound state. A single part collapses into a named state.
    #[must_use]
    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.len() == 1 {
            Self::Named(parts.remove(0))
        } else {
            Self::Composite(parts)
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Composite(parts) => write!(f, "({})", parts.join(", ")),
        }
    }
}

impl From<&str> for State {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for State {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<(&str, &str)> for State {
    fn from((a, b): (&str, &str)) -> Self {
        Self::composite([a, b])
    }
}

/// How many turns a state stays active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Never expires; there is exactly one such entry, the floor.
    Infinite,
    /// Expires after the given number of turns.
    Turns(u32),
}

impl Lifetime {
    /// Returns true for the floor lifetime.
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => f.write_str("inf"),
            Self::Turns(n) => write!(f, "{n}"),
        }
    }
}

/// A request to push a state, as returned by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The state to push.
    pub state: State,
    /// How long it should stay active.
    pub lifetime: Lifetime,
}

impl Transition {
    /// A transition to a new floor state.
    #[must_use]
    pub fn to(state: impl Into<State>) -> Self {
        Self {
            state: state.into(),
            lifetime: Lifetime::Infinite,
        }
    }

    /// A transition to a state that expires after `turns` turns.
    #[must_use]
    pub fn for_turns(state: impl Into<State>, turns: u32) -> Self {
        Self {
            state: state.into(),
            lifetime: Lifetime::Turns(turns),
        }
    }
}

impl From<State> for Transition {
    fn from(state: State) -> Self {
        Self::to(state)
    }
}

impl From<&str> for Transition {
    fn from(name: &str) -> Self {
        Self::to(name)
    }
}

/// The priority queue of active states owned by a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogStates {
    entries: VecDeque<Transition>,
}

impl DialogStates {
    /// Creates the queue holding only the floor state.
    #[must_use]
    pub fn new(floor: impl Into<State>) -> Self {
        let mut entries = VecDeque::new();
        entries.push_front(Transition::to(floor));
        Self { entries }
    }

    /// Pushes a state on top of the queue.
    ///
    /// An infinite transition clears every other entry first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLifetime` for a finite lifetime of zero turns.
    pub fn put(&mut self, transition: impl Into<Transition>) -> Result<(), DialogStateError> {
        let transition = transition.into();
        match transition.lifetime {
            Lifetime::Turns(0) => {
                return Err(DialogStateError::InvalidLifetime {
                    state: transition.state.to_string(),
                });
            }
            Lifetime::Infinite => self.entries.clear(),
            Lifetime::Turns(_) => {}
        }
        tracing::debug!(state = %transition.state, lifetime = %transition.lifetime, "pushing dialog state");
        self.entries.push_front(transition);
        Ok(())
    }

    /// Ages every finite entry by one turn and drops the expired ones.
    pub fn update_step(&mut self) {
        self.entries.retain_mut(|entry| match &mut entry.lifetime {
            Lifetime::Infinite => true,
            Lifetime::Turns(0) => {
                tracing::debug!(state = %entry.state, "dialog state expired");
                false
            }
            Lifetime::Turns(n) => {
                *n -= 1;
                true
            }
        });
    }

    /// Iterates the active states in priority order.
    pub fn iter_states(&self) -> impl Iterator<Item = &State> {
        self.entries.iter().map(|entry| &entry.state)
    }

    /// Iterates the entries with their remaining lifetimes.
    pub fn entries(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter()
    }

    /// Returns the highest-priority state.
    #[must_use]
    pub fn current(&self) -> Option<&State> {
        self.entries.front().map(|entry| &entry.state)
    }

    /// Returns whether a state is active at any priority.
    #[must_use]
    pub fn contains(&self, state: &State) -> bool {
        self.iter_states().any(|s| s == state)
    }

    /// Returns the floor state.
    #[must_use]
    pub fn floor(&self) -> Option<&State> {
        self.entries
            .iter()
            .find(|entry| entry.lifetime.is_infinite())
            .map(|entry| &entry.state)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops everything and installs a new floor.
    pub fn reset(&mut self, floor: impl Into<State>) {
        *self = Self::new(floor);
    }
}

impl fmt::Display for DialogStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|entry| format!("{}:{}", entry.state, entry.lifetime))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}
