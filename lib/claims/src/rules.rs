//! The claim bot's rule table.

use crate::admin::{change_formal_address, reset};
use crate::claim::{
    abort_claim, ask_to_start, begin_questionnaire, check_answer, claim_needs_editing, clarify, excuse_did_not_understand,
    greet, intro, no_rule_found, record_phone_damage, repeat_question, send_example, skip_question, start,
    store_confirmed_answer, submit_claim, user_no_claim,
};
use crate::smalltalk::{
    FEELING_INTENTS, answer_to_how_are_you, bye, change_topic, congratulate_birthday, neutral_emoji,
    resume_questionnaire, static_smalltalk_response, tell_a_joke, too_bad, urge_to_start, user_astonished,
    user_happy, user_sad_or_angry,
};
use crate::states::{
    ASK_CONTINUE_DESPITE_NO_SKIPPING, ASK_TO_START, ASKING_QUESTION, INITIAL, PREVIEWING_CLAIM, SMALLTALK, TOLD_JOKE,
    USER_CONFIRMING_ANSWER, asking_how_are_you, asking_should_i_tell_a_joke,
};
use parlance_dialog::{Handler, Outcome, Router, RuleTable, Sentiment, Trigger};

const GREETINGS: &[&str] = &["start", "hello", "smalltalk.greetings.hello", "smalltalk.greetings.start"];
const CLARIFY: &[&str] = &["clarify", "smalltalk.dialog.what_do_you_mean", "smalltalk.agent.can_you_help"];

fn intro_then_smalltalk() -> Handler {
    Handler::new("intro", Trigger::intents(CLARIFY.iter().chain(&["what_can_you_do"])), intro).wrap(
        |inner, composer, context| {
            inner(composer, context)?;
            Ok(Outcome::to(SMALLTALK))
        },
    )
}

fn smalltalk(name: &str, trigger: Trigger) -> Handler {
    resume_questionnaire(urge_to_start(Handler::new(name, trigger, static_smalltalk_response)))
}

/// Every rule of the claim bot.
///
/// # Errors
///
/// Returns an error if a command pattern does not compile.
pub fn rule_table() -> Result<RuleTable, regex::Error> {
    let table = RuleTable::new()
        .stateless(Handler::new("reset", Trigger::regex(r"^/reset\b")?, reset))
        .stateless(Handler::new("record_phone_damage", Trigger::intent("phone_broken"), record_phone_damage))
        .stateless(Handler::new("change_formal_address", Trigger::any_intent(), change_formal_address))
        .state(
            INITIAL,
            [
                Handler::new("greet", Trigger::intents(GREETINGS), greet),
                intro_then_smalltalk(),
                Handler::new("ask_to_start", Trigger::intent("phone_broken"), ask_to_start),
            ],
        )
        .state(
            SMALLTALK,
            [
                Handler::new("start", Trigger::intents(GREETINGS), start),
                intro_then_smalltalk(),
                Handler::new("user_no_claim", Trigger::intent("no_damage"), user_no_claim),
                Handler::new("ask_to_start", Trigger::intent("phone_broken"), ask_to_start),
            ],
        )
        .state(
            ASK_TO_START,
            [
                Handler::new("begin_questionnaire", Trigger::Affirmation, begin_questionnaire),
                Handler::new("begin_questionnaire", Trigger::intent("phone_broken"), begin_questionnaire),
                Handler::new("user_no_claim", Trigger::intent("no_damage"), user_no_claim),
                Handler::new("user_no_claim", Trigger::Negation, user_no_claim),
            ],
        )
        .state(
            ASK_CONTINUE_DESPITE_NO_SKIPPING,
            [
                Handler::new("repeat_question", Trigger::Affirmation, repeat_question),
                Handler::new("abort_claim", Trigger::Negation, abort_claim),
                Handler::new("abort_claim", Trigger::intent("no_damage"), abort_claim),
            ],
        )
        .state(
            ASKING_QUESTION,
            [
                Handler::new("clarify", Trigger::intents(CLARIFY), clarify),
                Handler::new("send_example", Trigger::intent("example"), send_example),
                smalltalk("thank_you", Trigger::intent("smalltalk.appraisal.thank_you")),
                Handler::new("skip_question", Trigger::intent("skip"), skip_question),
                Handler::new("skip_question", Trigger::Negation, skip_question),
                Handler::new("check_answer", Trigger::Media, check_answer),
                Handler::new("check_answer", Trigger::any_intent(), check_answer),
            ],
        )
        .state(
            USER_CONFIRMING_ANSWER,
            [
                Handler::new("store_confirmed_answer", Trigger::Affirmation, store_confirmed_answer),
                Handler::new("repeat_question", Trigger::intent("repeat"), repeat_question),
                Handler::new("repeat_question", Trigger::Negation, repeat_question),
                Handler::new("check_answer", Trigger::any_intent(), check_answer),
            ],
        )
        .state(
            asking_how_are_you(),
            [
                Handler::new("start", Trigger::intents(GREETINGS), start),
                Handler::new("ask_to_start", Trigger::intent("phone_broken"), ask_to_start),
                urge_to_start(Handler::new(
                    "answer_to_how_are_you",
                    Trigger::intents(FEELING_INTENTS),
                    answer_to_how_are_you,
                )),
                urge_to_start(Handler::new(
                    "answer_to_how_are_you",
                    Trigger::parameters(["feeling"]),
                    answer_to_how_are_you,
                )),
            ],
        )
        .state(
            asking_should_i_tell_a_joke(),
            [
                Handler::new("tell_a_joke", Trigger::Affirmation, tell_a_joke),
                Handler::new("too_bad", Trigger::Negation, too_bad),
            ],
        )
        .state(TOLD_JOKE, [Handler::new("tell_a_joke", Trigger::intent("smalltalk.agent.again"), tell_a_joke)])
        .state(
            PREVIEWING_CLAIM,
            [
                Handler::new("submit_claim", Trigger::intent("submit"), submit_claim),
                Handler::new("submit_claim", Trigger::Affirmation, submit_claim),
                Handler::new("claim_needs_editing", Trigger::Negation, claim_needs_editing),
            ],
        )
        .fallbacks([
            Handler::new("intro", Trigger::intent("what_can_you_do"), intro),
            Handler::new("user_astonished", Trigger::intents(["astonishment", "smalltalk.user.wow"]), user_astonished),
            Handler::new("excuse_did_not_understand", Trigger::intent("fallback"), excuse_did_not_understand),
            Handler::new("user_happy", Trigger::emoji(Sentiment::Positive), user_happy),
            Handler::new("neutral_emoji", Trigger::emoji(Sentiment::Neutral), neutral_emoji),
            Handler::new("user_sad_or_angry", Trigger::emoji(Sentiment::Negative), user_sad_or_angry),
            Handler::new("change_topic", Trigger::any_emoji(), change_topic),
            resume_questionnaire(Handler::new(
                "congratulate_birthday",
                Trigger::intent("smalltalk.user.has_birthday"),
                congratulate_birthday,
            )),
            resume_questionnaire(Handler::new("bye", Trigger::intent("smalltalk.greetings.bye"), bye)),
            smalltalk("static_smalltalk_response", Trigger::intent("smalltalk")),
            Handler::new("no_rule_found", Trigger::any_intent(), no_rule_found),
        ]);
    Ok(table)
}

/// The compiled claim bot router.
///
/// # Errors
///
/// As [`rule_table`].
pub fn router() -> Result<Router, regex::Error> {
    Ok(Router::new(rule_table()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_conversation::{MessageUnderstanding, State};

    fn state_handler<'a>(router: &'a Router, state: impl Into<State>, message: &MessageUnderstanding) -> Option<&'a str> {
        router
            .find_matching_state_handler(&state.into(), message)
            .map(Handler::name)
    }

    #[test]
    fn every_state_has_rules() {
        let router = router().expect("patterns compile");
        for state in [INITIAL, SMALLTALK, ASK_TO_START, ASKING_QUESTION, USER_CONFIRMING_ANSWER, PREVIEWING_CLAIM] {
            assert!(router.states().any(|s| *s == State::from(state)), "{state} has rules");
        }
    }

    #[test]
    fn greetings_do_not_swallow_goodbyes() {
        let router = router().expect("patterns compile");
        let bye = MessageUnderstanding::new("Tschüss", "smalltalk.greetings.bye");
        assert_eq!(state_handler(&router, SMALLTALK, &bye), None);
        assert_eq!(router.get_fallback_handler(&bye).map(Handler::name), Some("bye"));
        let hello = MessageUnderstanding::new("Hallo", "smalltalk.greetings.hello");
        assert_eq!(state_handler(&router, SMALLTALK, &hello), Some("start"));
    }

    #[test]
    fn answers_to_questions_are_checked() {
        let router = router().expect("patterns compile");
        let answer = MessageUnderstanding::new("Galaxy S9", "fallback");
        assert_eq!(state_handler(&router, ASKING_QUESTION, &answer), Some("check_answer"));
        let no = MessageUnderstanding::new("nein", "no");
        assert_eq!(state_handler(&router, ASKING_QUESTION, &no), Some("skip_question"));
        let photo = MessageUnderstanding::media("photos/1.jpg");
        assert_eq!(state_handler(&router, ASKING_QUESTION, &photo), Some("check_answer"));
    }

    #[test]
    fn the_reset_command_runs_regardless_of_state() {
        let router = router().expect("patterns compile");
        let command = MessageUnderstanding::new("/reset", "fallback");
        let names: Vec<_> = router.iter_stateless_matches(&command).map(Handler::name).collect();
        assert_eq!(names, ["reset", "change_formal_address"]);
    }

    #[test]
    fn unmatched_messages_reach_the_universal_fallback() {
        let router = router().expect("patterns compile");
        let odd = MessageUnderstanding::new("Wer hat an der Uhr gedreht?", "time.ask");
        assert_eq!(router.get_fallback_handler(&odd).map(Handler::name), Some("no_rule_found"));
        let chat = MessageUnderstanding::new("Bist du ein Roboter?", "smalltalk.agent.are_you_a_bot");
        assert_eq!(router.get_fallback_handler(&chat).map(Handler::name), Some("static_smalltalk_response"));
    }
}
