//! Property-based tests for the state machine
//!
//! Drives `transition` with arbitrary action sequences and applies the
//! resulting effects to an in-memory session, the way the runtime does.

use super::*;
use crate::persona::Persona;
use crate::session::{Session, Turn};
use proptest::prelude::*;
use std::sync::Arc;

fn test_context() -> ChatContext {
    ChatContext::new("prop-session", Arc::new(Persona::default()))
}

#[derive(Debug, Clone)]
enum Action {
    Submit(String),
    Process,
    Complete(Result<String, GenerationFailure>),
}

fn arb_failure() -> impl Strategy<Value = GenerationFailure> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map(GenerationFailure::quota),
        "[a-z ]{0,20}".prop_map(GenerationFailure::provider),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \t\n]{1,4}",
        "[a-zA-Zあ-ん]{1,12}",
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        arb_text().prop_map(Action::Submit),
        Just(Action::Process),
        prop_oneof!["[a-z]{1,12}".prop_map(Ok), arb_failure().prop_map(Err)]
            .prop_map(Action::Complete),
    ]
}

/// Apply effects to a session; returns the window size if generation was requested
fn apply(session: &mut Session, context: &ChatContext, effects: Vec<Effect>) -> Option<usize> {
    let mut window = None;
    for effect in effects {
        match effect {
            Effect::SetPendingInput { text } => session.pending_input = text,
            Effect::ClearPendingInput => session.pending_input.clear(),
            Effect::AppendTurn { turn } => session.transcript.push(turn),
            Effect::RequestGeneration => {
                window = Some(session.transcript.context_window(context.context_turns).len());
            }
            Effect::PersistSession | Effect::NotifyRender | Effect::ScheduleProcessing => {}
        }
    }
    window
}

fn to_event(action: Action) -> Event {
    match action {
        Action::Submit(text) => Event::Submit { text },
        Action::Process => Event::ProcessPending,
        Action::Complete(outcome) => Event::GenerationComplete { outcome },
    }
}

proptest! {
    #[test]
    fn prop_idle_transcript_is_even(actions in proptest::collection::vec(arb_action(), 0..60)) {
        let context = test_context();
        let mut session = Session::new("prop");

        for action in actions {
            let before = session.transcript.len();
            if let Ok(result) = transition(&session.state, &context, to_event(action)) {
                session.state = result.new_state;
                if let Some(window) = apply(&mut session, &context, result.effects) {
                    // Window = min(N, transcript length before the call + 1)
                    prop_assert_eq!(window, context.context_turns.min(before + 1));
                }
            }
            if session.state == ChatState::Idle {
                prop_assert_eq!(session.transcript.len() % 2, 0);
                prop_assert!(!session.flags().sending);
            }
        }
    }

    #[test]
    fn prop_rejected_events_change_nothing(actions in proptest::collection::vec(arb_action(), 0..60)) {
        let context = test_context();
        let mut state = ChatState::Idle;

        for action in actions {
            let event = to_event(action);
            match transition(&state, &context, event.clone()) {
                Ok(result) => state = result.new_state,
                Err(TransitionError::Busy) => {
                    prop_assert!(state.is_sending());
                    prop_assert!(
                        matches!(event, Event::Submit { .. }),
                        "only submits are rejected as busy, got {:?}",
                        event
                    );
                }
                Err(TransitionError::InvalidTransition(_)) => {
                    prop_assert!(
                        !matches!(event, Event::Submit { .. }),
                        "submits are never invalid, got {:?}",
                        event
                    );
                }
            }
        }
    }

    #[test]
    fn prop_blank_submit_never_appends(text in "[ \t\n]{0,8}") {
        let result = transition(&ChatState::Idle, &test_context(), Event::Submit { text }).unwrap();
        prop_assert_eq!(result.new_state, ChatState::Idle);
        prop_assert!(result.effects.is_empty());
    }

    #[test]
    fn prop_full_exchange_always_clears_sending(
        text in "[a-zA-Z]{1,12}",
        outcome in prop_oneof!["[a-z]{1,12}".prop_map(Ok), arb_failure().prop_map(Err)],
    ) {
        let context = test_context();
        let mut session = Session::new("prop");

        for event in [
            Event::Submit { text: text.clone() },
            Event::ProcessPending,
            Event::GenerationComplete { outcome },
        ] {
            let result = transition(&session.state, &context, event).unwrap();
            session.state = result.new_state;
            apply(&mut session, &context, result.effects);
        }

        prop_assert_eq!(&session.state, &ChatState::Idle);
        prop_assert!(session.pending_input.is_empty());
        prop_assert_eq!(&session.transcript.turns()[0], &Turn::user(text));
        prop_assert_eq!(session.transcript.len(), 2);
    }
}
