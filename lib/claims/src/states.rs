//! Dialog states of the claim conversation.

use parlance_conversation::State;

/// Floor state of a fresh conversation.
pub const INITIAL: &str = "initial";
pub const SMALLTALK: &str = "smalltalk";
pub const ASK_TO_START: &str = "ask_to_start";
pub const ASKING_QUESTION: &str = "asking_question";
pub const USER_CONFIRMING_ANSWER: &str = "user_confirming_answer";
pub const ASK_CONTINUE_DESPITE_NO_SKIPPING: &str = "ask_continue_despite_no_skipping";
pub const PREVIEWING_CLAIM: &str = "previewing_claim";
pub const TOLD_JOKE: &str = "told_joke";

/// Waiting for the answer to "how are you", for one turn.
#[must_use]
pub fn asking_how_are_you() -> State {
    State::composite(["asking", "how_are_you"])
}

/// Waiting for the answer to "should I tell a joke", for one turn.
#[must_use]
pub fn asking_should_i_tell_a_joke() -> State {
    State::composite(["asking", "should_i_tell_a_joke"])
}
