//! Whole conversations against the bundled rules, templates and questionnaires.

use parlance_claims::claim::{CLAIM_SUBMITTED, USER_NO_CLAIM};
use parlance_claims::states::{ASK_CONTINUE_DESPITE_NO_SKIPPING, ASKING_QUESTION, PREVIEWING_CLAIM, SMALLTALK, USER_CONFIRMING_ANSWER};
use parlance_claims::{INITIAL, questionnaire_catalog, router, template_bank};
use parlance_conversation::{
    ActionType, AnswerStore, ChatAction, Context, InMemoryAnswerStore, MessageUnderstanding, State,
};
use parlance_core::{User, UserId};
use parlance_dialog::{DialogConfig, PacingConfig, PlanningAgent};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const VALID_IMEI: &str = "356938035643809";

struct Conversation {
    agent: PlanningAgent,
    context: Context,
}

impl Conversation {
    fn new(user: User) -> Self {
        Self::with_answers(user, InMemoryAnswerStore::new())
    }

    fn with_answers(user: User, answers: InMemoryAnswerStore) -> Self {
        let config = DialogConfig {
            pacing: PacingConfig::disabled(),
            ..DialogConfig::default()
        };
        let agent = PlanningAgent::new(
            Arc::new(router().expect("patterns compile")),
            Arc::new(template_bank().expect("templates parse")),
            config,
        );
        let context = Context::new(
            user,
            INITIAL,
            Arc::new(questionnaire_catalog().expect("questionnaires parse")),
            Arc::new(answers),
        )
        .expect("store readable");
        Self { agent, context }
    }

    fn send(&mut self, understanding: MessageUnderstanding) -> Vec<ChatAction> {
        self.context.add_user_utterance(understanding);
        let composer = self
            .agent
            .build_next_actions(&mut self.context)
            .unwrap_or_else(|e| panic!("turn failed: {e}"));
        let actions = composer.collect_actions(&self.agent.config().pacing);
        self.context.add_actions(actions.clone());
        actions
    }

    fn say(&mut self, text: &str, intent: &str) -> Vec<ChatAction> {
        self.send(MessageUnderstanding::new(text, intent))
    }

    fn answer(&mut self, text: &str) -> Vec<ChatAction> {
        self.say(text, "fallback")
    }

    fn state(&self) -> Option<&State> {
        self.context.dialog_states().current()
    }

    /// Greets, reports the broken phone and agrees to file a claim.
    fn start_claim(&mut self) {
        self.say("Hallo", "hello");
        self.say("Mein Handy ist kaputt", "phone_broken");
        let actions = self.say("ja", "yes");
        assert!(actions.iter().any(|a| a.has_intent("model")), "first question is asked");
        assert_eq!(self.state(), Some(&State::named(ASKING_QUESTION)));
    }
}

fn any_intent(actions: &[ChatAction], intent: &str) -> bool {
    actions.iter().any(|a| a.has_intent(intent))
}

fn text(actions: &[ChatAction]) -> String {
    actions.iter().map(ChatAction::render).collect::<Vec<_>>().join("\n")
}

#[test]
fn greeting_leads_into_smalltalk() {
    let mut conversation = Conversation::new(User::new(UserId::new()));

    let actions = conversation.say("Hallo", "hello");

    assert_eq!(actions[0].action_type(), ActionType::Saying);
    assert!(actions[0].has_intent("hello"));
    assert!(any_intent(&actions, "what_i_can_do"));
    assert_eq!(conversation.state(), Some(&State::named(SMALLTALK)));
}

#[test]
fn invalid_answers_get_an_apology_and_the_hint() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.start_claim();
    conversation.answer("Galaxy S9");

    let actions = conversation.answer("12345");

    assert_eq!(actions.len(), 2);
    assert!(actions[0].has_intent("sorry"));
    assert!(actions[0].has_intent("invalid_answer"));
    assert!(actions[0].render().starts_with("Das tut mir leid, ") || actions[0].render().starts_with("Entschuldigung, "));
    assert!(actions[1].has_intent("give_hint"));
    assert!(actions[1].render().contains("*#06#"));
    assert_eq!(conversation.state(), Some(&State::named(ASKING_QUESTION)));
    assert!(!conversation.context.answered_ids().contains("imei"));
}

#[test]
fn confirmed_answers_are_stored() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.start_claim();
    conversation.answer("Galaxy S9");

    let actions = conversation.answer("35-693803-564380-9");
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type(), ActionType::AskingQuestion);
    assert!(actions[0].render().contains(VALID_IMEI));
    assert_eq!(
        actions[0].choices(),
        Some(&["Ja, richtig".to_string(), "Nein, falsch".to_string()][..])
    );
    assert_eq!(conversation.state(), Some(&State::named(USER_CONFIRMING_ANSWER)));

    let actions = conversation.say("ja", "yes");
    let answers = conversation.context.answers().expect("store readable");
    assert_eq!(answers.get("imei").map(String::as_str), Some(VALID_IMEI));
    assert!(any_intent(&actions, "questionnaire_finished"));
    assert!(any_intent(&actions, "damage_type"));
}

#[test]
fn rejected_confirmations_repeat_the_question() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.start_claim();
    conversation.answer("Galaxy S9");
    conversation.answer(VALID_IMEI);

    let actions = conversation.say("nein", "no");

    assert!(any_intent(&actions, "again"));
    assert!(any_intent(&actions, "imei"));
    assert_eq!(conversation.state(), Some(&State::named(ASKING_QUESTION)));
    assert!(!conversation.context.answered_ids().contains("imei"));
}

#[test]
fn required_questions_cannot_be_skipped() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.start_claim();

    let actions = conversation.say("überspringen", "skip");
    assert_eq!(actions.len(), 1);
    assert!(actions[0].has_intent("cannot_skip_this_question"));
    assert!(actions[0].choices().is_some());
    assert_eq!(conversation.state(), Some(&State::named(ASK_CONTINUE_DESPITE_NO_SKIPPING)));

    conversation.say("nein", "no");
    assert!(conversation.context.flag(USER_NO_CLAIM));
    assert_eq!(conversation.state(), Some(&State::named(SMALLTALK)));
}

#[test]
fn a_complete_claim_is_previewed_and_submitted() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.start_claim();
    conversation.answer("Galaxy S9");
    conversation.answer(VALID_IMEI);
    conversation.say("ja", "yes");
    conversation.answer("Display");
    conversation.answer("Ist mir runtergefallen");
    conversation.send(MessageUnderstanding::media("photos/display.jpg"));
    conversation.answer("+49 171 1234567");

    let actions = conversation.answer("max@example.org");
    assert!(conversation.context.claim_finished());
    assert!(any_intent(&actions, "claim_finished"));
    let preview = text(&actions);
    assert!(preview.contains(&format!("Wie lautet die IMEI?: {VALID_IMEI}")), "{preview}");
    assert!(preview.contains("Welches Handymodell haben Sie?: Galaxy S9"), "{preview}");
    assert_eq!(conversation.state(), Some(&State::named(PREVIEWING_CLAIM)));

    let actions = conversation.say("ja", "yes");
    assert!(any_intent(&actions, "claim_submitted"));
    assert!(conversation.context.flag(CLAIM_SUBMITTED));
}

/// Answers every question up to the preview, with `description` as the
/// answer to "Wie ist es passiert?".
fn complete_claim(conversation: &mut Conversation, description: &str) -> Vec<ChatAction> {
    conversation.start_claim();
    conversation.answer("Galaxy S9");
    conversation.answer(VALID_IMEI);
    conversation.say("ja", "yes");
    conversation.answer("Display");
    conversation.answer(description);
    conversation.send(MessageUnderstanding::media("photos/display.jpg"));
    conversation.answer("+49 171 1234567");
    conversation.answer("max@example.org")
}

#[test]
fn answers_with_template_markup_are_shown_verbatim() {
    for description in [
        "Ist mir {{ runtergefallen",
        "{{ user.is_admin }} {{ overall_completion }}",
        "{% if formal_address %}oben{% endif %}",
    ] {
        let mut conversation = Conversation::new(User::new(UserId::new()));

        let preview = text(&complete_claim(&mut conversation, description));

        assert!(preview.contains(&format!("Wie ist es passiert?: {description}")), "{preview}");
        assert_eq!(conversation.state(), Some(&State::named(PREVIEWING_CLAIM)));
        let actions = conversation.say("ja", "yes");
        assert!(any_intent(&actions, "claim_submitted"));
    }
}

#[test]
fn messages_after_the_last_answer_lead_to_the_preview() {
    let user = User::new(UserId::new());
    let answers = InMemoryAnswerStore::new();
    for (question, answer) in [
        ("model", "Galaxy S9"),
        ("imei", VALID_IMEI),
        ("damage_type", "Display"),
        ("description", "Runtergefallen"),
        ("photo", "photos/display.jpg"),
        ("phone", "+491711234567"),
        ("email", "max@example.org"),
    ] {
        answers.add_answer(user.id, question, answer).expect("store writable");
    }
    let mut conversation = Conversation::with_answers(user, answers);
    conversation
        .context
        .dialog_states_mut()
        .put(ASKING_QUESTION)
        .expect("infinite lifetime");
    assert!(conversation.context.claim_finished());

    let actions = conversation.answer("hallo?");

    assert!(any_intent(&actions, "claim_preview"));
    assert!(text(&actions).contains("Welches Handymodell haben Sie?: Galaxy S9"));
    assert_eq!(conversation.state(), Some(&State::named(PREVIEWING_CLAIM)));
}

#[test]
fn switching_to_du_reruns_the_turn_informally() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.say("Hallo", "hello");
    assert!(conversation.context.user().formal_address);

    let actions = conversation.say("Kannst du mir helfen?", "smalltalk.agent.can_you_help");

    assert!(!conversation.context.user().formal_address);
    assert!(actions[0].has_intent("we_say_du"));
    assert_eq!(actions.iter().filter(|a| a.has_intent("we_say_du")).count(), 1);
    assert!(text(&actions).contains("Sag einfach"), "{}", text(&actions));
}

#[test]
fn reset_is_reserved_for_admins() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.start_claim();
    conversation.answer("Galaxy S9");

    let actions = conversation.say("/reset", "fallback");

    assert!(actions[0].has_intent("no_permission"));
    assert!(conversation.context.answered_ids().contains("model"));
    assert_eq!(conversation.state(), Some(&State::named(ASKING_QUESTION)));
}

#[test]
fn admins_can_reset_the_conversation() {
    let mut conversation = Conversation::new(User::new(UserId::new()).as_admin());
    conversation.start_claim();
    conversation.answer("Galaxy S9");

    let actions = conversation.say("/reset", "fallback");

    assert_eq!(actions.len(), 1);
    assert!(actions[0].has_intent("reset_done"));
    assert!(conversation.context.answers().expect("store readable").is_empty());
    assert!(!conversation.context.has_answered_questions());
    assert_eq!(conversation.state(), Some(&State::named(INITIAL)));
}

#[test]
fn long_smalltalk_is_nudged_towards_a_claim() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.say("Hallo", "hello");

    for turn in 1..=3 {
        let actions = conversation.say("Bist du ein Bot?", "smalltalk.agent.are_you_a_bot");
        assert!(any_intent(&actions, "smalltalk.agent.are_you_a_bot"), "turn {turn}");
        assert!(!any_intent(&actions, "urge_to_start_level_1"), "turn {turn}");
    }
    let actions = conversation.say("Bist du ein Bot?", "smalltalk.agent.are_you_a_bot");
    assert!(any_intent(&actions, "urge_to_start_level_1"));
}

#[test]
fn messages_without_a_rule_are_answered_with_what_was_understood() {
    let mut conversation = Conversation::new(User::new(UserId::new()));
    conversation.say("Hallo", "hello");

    let actions = conversation.say("Wie spät ist es?", "time.ask");

    assert!(actions[0].has_intent("sorry"));
    assert!(actions[0].render().contains("\"time.ask\""));
}
