use camsource::dialog::display_name;
use camsource::dialog::state::{transition, DialogEvent, DialogState, Effect};
use camsource::Resolution;
use proptest::prelude::*;

fn any_state() -> impl Strategy<Value = DialogState> {
    prop_oneof![
        Just(DialogState::Initial),
        Just(DialogState::ClickedTest),
        Just(DialogState::TestSuccessful),
        Just(DialogState::TestFailed),
        Just(DialogState::NoWebcams),
        Just(DialogState::Unsupported),
    ]
}

fn any_event() -> impl Strategy<Value = DialogEvent> {
    prop_oneof![
        Just(DialogEvent::NoCameras),
        Just(DialogEvent::CameraUnsupported),
        Just(DialogEvent::ResolutionsLoading),
        Just(DialogEvent::ResolutionsReady),
        Just(DialogEvent::ActionPressed),
        Just(DialogEvent::ProbeSucceeded),
        Just(DialogEvent::ProbeFailed),
        Just(DialogEvent::Cancelled),
    ]
}

proptest! {
    #[test]
    fn display_name_respects_limit(name in "\\PC{0,40}", max in 1usize..30) {
        let shown = display_name(&name, max);
        let truncated = name.chars().count() > max;

        if truncated {
            prop_assert!(shown.ends_with("..."));
            prop_assert!(shown.chars().count() <= max + 3);
        } else {
            prop_assert_eq!(shown, name.trim());
        }
    }

    #[test]
    fn resolution_text_parses_back(width in 1u32..10_000, height in 1u32..10_000) {
        let res = Resolution::new(width, height);
        let parsed: Resolution = res.to_string().parse().unwrap();
        prop_assert_eq!(parsed, res);
    }

    #[test]
    fn no_webcams_is_sticky(events in proptest::collection::vec(any_event(), 0..20)) {
        let mut state = DialogState::NoWebcams;
        for event in events {
            let t = transition(state, event);
            prop_assert!(!t.effects.contains(&Effect::ScheduleProbe));
            prop_assert!(!t.effects.contains(&Effect::CreateSource));
            state = t.state;
        }
        prop_assert_eq!(state, DialogState::NoWebcams);
    }

    #[test]
    fn cancel_closes_without_changing_state(state in any_state()) {
        let t = transition(state, DialogEvent::Cancelled);
        prop_assert_eq!(t.state, state);
        prop_assert_eq!(t.effects, vec![Effect::Close]);
    }

    #[test]
    fn sources_are_created_only_after_a_successful_test(
        start in any_state(),
        events in proptest::collection::vec(any_event(), 0..30),
    ) {
        let mut state = start;
        for event in events {
            let t = transition(state, event);
            if t.effects.contains(&Effect::CreateSource) {
                prop_assert_eq!(state, DialogState::TestSuccessful);
                prop_assert!(t.effects.contains(&Effect::Close));
            }
            if t.effects.contains(&Effect::ScheduleProbe) {
                prop_assert!(matches!(state, DialogState::Initial | DialogState::TestFailed));
                prop_assert_eq!(t.state, DialogState::ClickedTest);
            }
            state = t.state;
        }
    }

    #[test]
    fn probe_results_only_move_clicked_test(state in any_state(), success in any::<bool>()) {
        let event = if success { DialogEvent::ProbeSucceeded } else { DialogEvent::ProbeFailed };
        let t = transition(state, event);
        if state == DialogState::ClickedTest {
            let expected = if success { DialogState::TestSuccessful } else { DialogState::TestFailed };
            prop_assert_eq!(t.state, expected);
        } else {
            prop_assert!(t.is_noop(state));
        }
    }
}
