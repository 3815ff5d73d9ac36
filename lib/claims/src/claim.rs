//! Handlers that walk the user through filing a damage claim.

use crate::states::{
    ASK_CONTINUE_DESPITE_NO_SKIPPING, ASK_TO_START, ASKING_QUESTION, PREVIEWING_CLAIM, SMALLTALK,
    USER_CONFIRMING_ANSWER, asking_how_are_you,
};
use parlance_conversation::{Context, NO_ANSWER, Question};
use parlance_dialog::{HandlerError, Outcome, Parameters, ResponseComposer, render_question};
use rand::Rng;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Answer awaiting the user's confirmation.
pub const USER_ANSWER: &str = "user_answer";
/// Set once the user said there is nothing to claim.
pub const USER_NO_CLAIM: &str = "user_no_claim";
/// Set once the first question was asked.
pub const QUESTIONNAIRE_STARTED: &str = "questionnaire_started";
/// Set once the finished claim was submitted.
pub const CLAIM_SUBMITTED: &str = "claim_submitted";

/// Question filled in from the `damage_type` parameter of `phone_broken`.
const DAMAGE_TYPE: &str = "damage_type";

/// Bot messages within which an introduction is not repeated.
pub(crate) const RECENT_MESSAGES: usize = 10;

type HandlerResult = Result<Outcome, HandlerError>;

pub(crate) fn chance(probability: f64) -> bool {
    rand::thread_rng().gen_bool(probability.clamp(0.0, 1.0))
}

fn current_question(context: &Context) -> Result<Question, HandlerError> {
    context
        .current_question()
        .cloned()
        .ok_or(HandlerError::NoCurrentQuestion)
}

fn user_text(context: &Context) -> String {
    context
        .last_user_utterance()
        .and_then(|u| u.text().or(u.media_location()))
        .unwrap_or_default()
        .to_string()
}

fn last_intent(context: &Context) -> String {
    context
        .last_user_utterance()
        .map(|u| u.intent().to_string())
        .unwrap_or_default()
}

/// First greeting: hello, plus an introduction unless one was given lately.
pub fn greet(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    composer.say("hello")?;
    if !context.has_outgoing_intent_within("what i can do", RECENT_MESSAGES) {
        composer.say("what i can do")?;
    }
    Ok(Outcome::to(SMALLTALK))
}

/// Greeting during smalltalk: hello, then ask how the user is doing.
pub fn start(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    composer.say("hello")?;
    if !context.has_outgoing_intent_within("how are you", RECENT_MESSAGES) {
        composer.ask("how are you")?;
        return Ok(Outcome::for_turns(asking_how_are_you(), 1));
    }
    Ok(Outcome::to(SMALLTALK))
}

pub fn intro(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    if !context.has_outgoing_intent_within("what i can do", RECENT_MESSAGES) {
        composer.say("what i can do")?;
    }
    composer.say("what you can say")?;
    Ok(Outcome::Stay)
}

pub fn ask_to_start(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.ask_with_choices("claim damage", &["affirm_yes", "negate_no"])?;
    Ok(Outcome::to(ASK_TO_START))
}

/// Sympathizes and records the damage type if the NLU extracted one.
pub fn record_phone_damage(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    composer.say("sorry for that")?;
    let damage = context
        .last_user_utterance()
        .and_then(|u| u.parameter_str(DAMAGE_TYPE))
        .filter(|d| !d.is_empty())
        .map(ToString::to_string);
    if let Some(damage) = damage {
        if context.questionnaires().question(DAMAGE_TYPE).is_some() {
            context.add_answer_to_question(DAMAGE_TYPE, &damage)?;
        } else {
            debug!(damage, "No damage type question to record the damage in");
        }
    }
    Ok(Outcome::Stay)
}

pub fn begin_questionnaire(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    composer.say("with pleasure")?;
    context.set_value(QUESTIONNAIRE_STARTED, true);
    ask_next_question(composer, context)
}

pub fn user_no_claim(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    context.set_value(USER_NO_CLAIM, true);
    composer.say("pity no claim")?.say("chat on")?;
    Ok(Outcome::to(SMALLTALK))
}

pub fn send_example(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    if context.claim_finished() {
        return preview_claim(composer, context);
    }
    let question = current_question(context)?;
    if question.example().is_some() {
        composer.give_example(&question)?;
    } else {
        composer.say("no example")?;
    }
    Ok(Outcome::Stay)
}

/// Gives the hint, or the example when the hint was just given or the user
/// asked for one.
pub fn clarify(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    if context.claim_finished() {
        return preview_claim(composer, context);
    }
    let question = current_question(context)?;
    let mut wants_example = last_intent(context) == "example";
    if question.hint().is_none() || context.has_outgoing_intent_within("give_hint", 2_usize) {
        wants_example = true;
    } else {
        composer.give_hint(&question)?;
    }
    if wants_example {
        send_example(composer, context)?;
    }
    Ok(Outcome::Stay)
}

/// Validates the latest message as the answer to the current question.
/// Once every question is answered, shows the claim preview instead.
pub fn check_answer(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    if context.claim_finished() {
        return preview_claim(composer, context);
    }
    let question = current_question(context)?;
    let Some(answer) = question.check(&user_text(context)) else {
        composer.say("sorry")?.say("invalid answer")?;
        if question.hint().is_some() {
            composer.give_hint(&question)?;
        }
        return Ok(Outcome::to(ASKING_QUESTION));
    };
    if question.confirm().is_some() {
        composer.ask_to_confirm(&question, &answer)?;
        context.set_value(USER_ANSWER, answer);
        return Ok(Outcome::to(USER_CONFIRMING_ANSWER));
    }
    store_answer(composer, context, &answer)
}

/// Stores the answer the user just confirmed.
pub fn store_confirmed_answer(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    if context.claim_finished() {
        return preview_claim(composer, context);
    }
    let answer: String = context
        .value_as(USER_ANSWER)
        .ok_or_else(|| HandlerError::Failed {
            reason: "no answer awaits confirmation".to_string(),
        })?;
    context.remove_value(USER_ANSWER);
    store_answer(composer, context, &answer)
}

fn store_answer(composer: &mut ResponseComposer, context: &mut Context, answer: &str) -> HandlerResult {
    let question = current_question(context)?;
    context.add_answer_to_question(question.id(), answer)?;
    if question.implicit_grounding().is_some() {
        composer.implicitly_ground(&question, answer)?;
    } else {
        composer.say("ok thank you")?;
    }
    ask_next_question(composer, context)
}

/// Asks the current question, announcing a new questionnaire when it is the
/// first one of it, or previews the claim once everything is answered.
pub fn ask_next_question(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    let Ok(question) = current_question(context) else {
        return preview_claim(composer, context);
    };
    if let Some(questionnaire) = context.current_questionnaire().cloned()
        && questionnaire.is_first_question(&question)
    {
        if context.has_answered_questions() {
            composer.say("questionnaire finished")?;
        }
        composer.send_title(&questionnaire)?;
    }
    composer.then_ask_question(&question)?;
    Ok(Outcome::to(ASKING_QUESTION))
}

pub fn repeat_question(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    if context.claim_finished() {
        return preview_claim(composer, context);
    }
    let question = current_question(context)?;
    composer.say("again")?.ask_question(&question)?;
    Ok(Outcome::to(ASKING_QUESTION))
}

/// Skips optional questions; required ones ask whether to go on anyway.
pub fn skip_question(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    if context.claim_finished() {
        return preview_claim(composer, context);
    }
    let question = current_question(context)?;
    if question.is_required() {
        composer
            .say("sorry")?
            .say("but")?
            .say("cannot skip this question")?
            .ask_with_choices("continue anyway", &["affirm_yes", "negate_no"])?;
        return Ok(Outcome::to(ASK_CONTINUE_DESPITE_NO_SKIPPING));
    }
    let value = render_question(&question, composer.loader().environment())?;
    let parameters = Parameters::from([("question".to_string(), value)]);
    composer.say_with("skip this question", &parameters)?;
    context.add_answer_to_question(question.id(), NO_ANSWER)?;
    ask_next_question(composer, context)
}

pub fn abort_claim(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    context.set_value(USER_NO_CLAIM, true);
    composer.say("claim aborted")?;
    Ok(Outcome::to(SMALLTALK))
}

/// Shows every answer and asks whether to submit.
pub fn preview_claim(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    let answers = context.answers()?;
    let mut lines = Vec::new();
    for question in context.questionnaires().questionnaires().iter().flat_map(|q| q.questions()) {
        let Some(answer) = answers.get(question.id()) else {
            continue;
        };
        let title = composer.loader().render_literal(question.title(), &Parameters::new())?;
        lines.push(format!("{title}: {answer}"));
    }
    let summary = lines.join("\n");
    let parameters = Parameters::from([("summary".to_string(), JsonValue::from(summary))]);
    composer
        .say("claim finished")?
        .then_say_with("claim preview", &parameters)?
        .then_ask_with_choices("submit claim", &["affirm_submit", "negate_edit"])?;
    Ok(Outcome::to(PREVIEWING_CLAIM))
}

pub fn submit_claim(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    context.set_value(CLAIM_SUBMITTED, true);
    composer.say("claim submitted")?;
    Ok(Outcome::to(SMALLTALK))
}

pub fn claim_needs_editing(composer: &mut ResponseComposer, _context: &mut Context) -> HandlerResult {
    composer.say("claim editing")?;
    Ok(Outcome::to(SMALLTALK))
}

pub fn excuse_did_not_understand(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    composer.say("sorry")?.say("but")?.say("did not understand")?;
    if context.questionnaire_completion_ratio() > 0.3 && chance(0.8) {
        composer.say("reformulate")?;
    }
    Ok(Outcome::Stay)
}

/// Universal fallback: tells the user what was understood.
pub fn no_rule_found(composer: &mut ResponseComposer, context: &mut Context) -> HandlerResult {
    let parameters = Parameters::from([(
        "understanding".to_string(),
        JsonValue::from(last_intent(context)),
    )]);
    composer.say("sorry")?.say_with("what i understood", &parameters)?;
    if chance(0.5) {
        composer.say("ask something else")?;
    }
    Ok(Outcome::Stay)
}
