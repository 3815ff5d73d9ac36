//! Administrative commands and the address register switch.

use parlance_conversation::Context;
use parlance_dialog::{HandlerError, Outcome, ResponseComposer};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

/// Set while a turn is re-run after switching to the informal register.
pub const ADDRESS_CHANGED: &str = "address_changed";

const INFORMAL_MARKERS: &[&str] = &[" du", "du ", "dein"];
const FORMAL_MARKERS: &[&str] = &["Ihr", "Sie", "Ihnen"];

/// `/reset`: forgets the conversation and all answers. Admins only.
///
/// # Errors
///
/// Returns the answer store's error.
pub fn reset(composer: &mut ResponseComposer, context: &mut Context) -> Result<Outcome, HandlerError> {
    if !context.user().is_admin {
        warn!(user_id = %context.user().id, "Reset refused, user is no admin");
        composer.say("no permission")?;
        return Ok(Outcome::Stop);
    }
    info!(user_id = %context.user().id, "Resetting conversation");
    context.reset()?;
    composer.say("reset done")?;
    Ok(Outcome::Stop)
}

/// Switches between "Sie" and "du".
///
/// An explicit `formal_address` parameter wins; without any parameters the
/// message text is searched for the pronouns the user chose. A switch
/// re-runs the turn so every template renders in the new register.
///
/// # Errors
///
/// Returns composing failures of the "we say du" notice.
pub fn change_formal_address(
    composer: &mut ResponseComposer,
    context: &mut Context,
) -> Result<Outcome, HandlerError> {
    if context.remove_value(ADDRESS_CHANGED).is_some() {
        composer.say("we say du")?;
        return Ok(Outcome::Stay);
    }
    let Some(understanding) = context.last_user_utterance() else {
        return Ok(Outcome::Stay);
    };
    let requested = match understanding.parameter("formal_address") {
        Some(value) => {
            let Some(formal) = parse_address(value) else {
                warn!(value = %value, "Invalid formal_address value");
                return Ok(Outcome::Stay);
            };
            Some(formal)
        }
        None if understanding.parameters().is_empty() => understanding.text().and_then(detect_address),
        None => None,
    };
    let Some(formal) = requested.filter(|f| *f != context.user().formal_address) else {
        return Ok(Outcome::Stay);
    };

    context.user_mut().formal_address = formal;
    info!(user_id = %context.user().id, formal, "Switched address register");
    if !formal {
        context.set_value(ADDRESS_CHANGED, true);
    }
    Ok(Outcome::Reevaluate)
}

fn parse_address(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(formal) => Some(*formal),
        JsonValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn detect_address(text: &str) -> Option<bool> {
    let lower = text.to_lowercase();
    if INFORMAL_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(false)
    } else if FORMAL_MARKERS.iter().any(|m| text.contains(m)) {
        Some(true)
    } else {
        None
    }
}
