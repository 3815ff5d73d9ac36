//! Smalltalk: canned replies, how-are-you and jokes.
//!
//! Smalltalk handlers are wrapped twice. [`urge_to_start`] counts smalltalk
//! turns and nudges the user towards filing a claim from the fourth one on;
//! [`resume_questionnaire`] goes back to the open question afterwards.

use crate::claim::{QUESTIONNAIRE_STARTED, RECENT_MESSAGES, USER_NO_CLAIM, ask_next_question};
use crate::states::{SMALLTALK, TOLD_JOKE, asking_should_i_tell_a_joke};
use parlance_conversation::Context;
use parlance_dialog::{ComposeError, Handler, HandlerError, Outcome, Parameters, ResponseComposer};

/// Number of smalltalk turns so far.
pub const SMALLTALK_COUNTER: &str = "smalltalk_counter";

/// Intents that answer "how are you".
pub const FEELING_INTENTS: &[&str] = &[
    "smalltalk.appraisal.good",
    "smalltalk.user.can_not_sleep",
    "smalltalk.appraisal.thank_you",
    "smalltalk.user.good",
    "smalltalk.user.happy",
];

/// Smalltalk turns before the first nudge.
const URGE_THRESHOLD: u64 = 4;
/// Last smalltalk turn that gets a nudge.
const URGE_LIMIT: u64 = 9;

type HandlerResult = Result<Outcome, HandlerError>;

fn last_intent(context: &Context) -> String {
    context
        .last_user_utterance()
        .map(|u| u.intent().to_string())
        .unwrap_or_default()
}

/// Counts smalltalk turns and appends an escalating nudge to start a claim.
/// Users who said they have nothing to claim are left alone.
#[must_use]
pub fn urge_to_start(handler: Handler) -> Handler {
    handler.wrap(|inner, composer, context| {
        if context.flag(USER_NO_CLAIM) {
            return inner(composer, context);
        }
        let count = context.value_as::<u64>(SMALLTALK_COUNTER).unwrap_or(0) + 1;
        context.set_value(SMALLTALK_COUNTER, count);
        let outcome = inner(composer, context)?;
        if (URGE_THRESHOLD..=URGE_LIMIT).contains(&count) {
            composer.say(&format!("urge to start level {}", count - (URGE_THRESHOLD - 1)))?;
        }
        Ok(outcome)
    })
}

/// After the wrapped handler, asks the open question again if a
/// questionnaire is under way, otherwise stays in smalltalk.
#[must_use]
pub fn resume_questionnaire(handler: Handler) -> Handler {
    handler.wrap(|inner, composer, context| {
        inner(composer, context)?;
        if context.flag(QUESTIONNAIRE_STARTED) && !context.claim_finished() {
            return ask_next_question(composer, context);
        }
        Ok(Outcome::to(SMALLTALK))
    })
}

/// Replies with the template named after the intent itself.
pub fn static_smalltalk_response(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    let intent = last_intent(context);
    let said = composer.say(&intent).map(|_| ());
    match said {
        Ok(()) => {}
        Err(ComposeError::Template(e)) if e.is_no_viable_template() => {
            composer.say("interesting")?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Outcome::Stay)
}

pub fn answer_to_how_are_you(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    let intent = last_intent(context);
    let feeling = context
        .last_user_utterance()
        .and_then(|u| u.parameter_str("feeling"))
        .map(ToString::to_string);
    if intent == "smalltalk.appraisal.thank_you" {
        composer.say("with pleasure")?;
    } else if ["smalltalk.appraisal", "smalltalk.user.good", "smalltalk.user.happy"]
        .iter()
        .any(|prefix| intent.starts_with(prefix))
    {
        composer.say("glad to hear that")?.say("i feel good")?;
    } else if let Some(feeling) = feeling {
        let parameters = Parameters::from([("feeling".to_string(), feeling.into())]);
        composer.say_with("user feeling", &parameters)?;
    } else {
        static_smalltalk_response(composer, context)?;
    }

    if !context.has_outgoing_intent_within("should i tell a joke", RECENT_MESSAGES) {
        composer.then_ask_with_choices("should i tell a joke", &["affirm_yes", "negate_no"])?;
        return Ok(Outcome::for_turns(asking_should_i_tell_a_joke(), 1));
    }
    Ok(Outcome::to(SMALLTALK))
}

pub fn tell_a_joke(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("joke")?;
    Ok(Outcome::for_turns(TOLD_JOKE, 1))
}

pub fn too_bad(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("too bad")?;
    Ok(Outcome::to(SMALLTALK))
}

pub fn congratulate_birthday(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.send_media("happy birthday", Some("congratulations"))?;
    Ok(Outcome::Stay)
}

pub fn bye(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.send_media("tschuess", None)?;
    Ok(Outcome::Stay)
}

pub fn user_astonished(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("astonished")?;
    Ok(Outcome::Stay)
}

pub fn user_happy(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("emoji positive")?;
    Ok(Outcome::Stay)
}

pub fn neutral_emoji(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("emoji neutral")?;
    Ok(Outcome::Stay)
}

pub fn user_sad_or_angry(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("emoji negative")?;
    Ok(Outcome::Stay)
}

/// Any other emoji: steer back to the claim.
pub fn change_topic(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("change topic")?;
    Ok(Outcome::Stay)
}
