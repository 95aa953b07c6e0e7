use duet_audio::kernel::effect::SideEffect;
use duet_audio::kernel::event::{GenerationRequest, Invalidation, StatusReport, VoicePreset};
use duet_audio::kernel::state::{
    GenerationSession, GenerationState, LifecycleGraph, LifecycleRequest, StateDelta,
};
use duet_audio::kernel::time::synthetic_progress;
use duet_audio::GenerationError;

fn session(max_polls: u32) -> GenerationSession {
    GenerationSession::new(
        GenerationRequest::new("c1", VoicePreset::MaleCasual, VoicePreset::FemaleFormal),
        max_polls,
    )
}

#[test]
fn test_transition_table() {
    use GenerationState::*;
    use LifecycleRequest::*;

    assert_eq!(LifecycleGraph::transition(Idle, Start), Some(Requesting));
    assert_eq!(LifecycleGraph::transition(Ready, Start), Some(Requesting));
    assert_eq!(LifecycleGraph::transition(TimedOut, Start), Some(Requesting));
    assert_eq!(LifecycleGraph::transition(Requesting, Start), None);
    assert_eq!(LifecycleGraph::transition(Polling, Start), None);

    assert_eq!(LifecycleGraph::transition(Requesting, Completed), Some(Ready));
    assert_eq!(LifecycleGraph::transition(Requesting, Accepted), Some(Polling));
    assert_eq!(LifecycleGraph::transition(Polling, Accepted), None);
    assert_eq!(LifecycleGraph::transition(Requesting, BudgetExhausted), None);
    assert_eq!(LifecycleGraph::transition(Polling, BudgetExhausted), Some(TimedOut));

    // Terminal states ignore everything but a new start.
    for terminal in [Ready, Failed, TimedOut] {
        for request in [Accepted, Completed, Rejected, BudgetExhausted, Cancel] {
            assert_eq!(LifecycleGraph::transition(terminal, request), None);
        }
    }
    assert_eq!(LifecycleGraph::transition(Idle, Cancel), None);
}

#[test]
fn test_synthetic_progress_saturates_at_ninety() {
    let values: Vec<u8> = (0..=15).map(synthetic_progress).collect();
    assert_eq!(&values[..4], &[0, 10, 20, 30]);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*values.last().expect("values"), 90);
    assert_eq!(synthetic_progress(u32::MAX), 90);
}

#[test]
fn test_generating_answer_starts_polling() {
    let mut s = session(60);
    let effects = s.reduce(StateDelta::RequestAnswered(StatusReport::generating()));
    assert_eq!(effects, vec![SideEffect::StartPolling]);
    assert_eq!(s.state, GenerationState::Polling);
    assert_eq!(s.progress, 0);
}

#[test]
fn test_ready_answer_invalidates_caches() {
    let mut s = session(60);
    let effects = s.reduce(StateDelta::RequestAnswered(StatusReport::ready("u", 1.0)));
    assert_eq!(s.state, GenerationState::Ready);
    assert_eq!(s.progress, 100);
    assert!(effects.contains(&SideEffect::StopPolling));
    assert!(effects.contains(&SideEffect::Invalidate(Invalidation::GenerationStatus(
        "c1".into()
    ))));
    assert!(effects.contains(&SideEffect::Invalidate(Invalidation::RecordingList)));
}

#[test]
fn test_budget_exhaustion_times_out() {
    let mut s = session(3);
    s.reduce(StateDelta::RequestAnswered(StatusReport::generating()));
    s.reduce(StateDelta::PollAnswered(StatusReport::generating()));
    s.reduce(StateDelta::PollErrored("timeout".to_string()));
    assert_eq!(s.state, GenerationState::Polling);

    let effects = s.reduce(StateDelta::PollAnswered(StatusReport::generating()));
    assert_eq!(effects, vec![SideEffect::StopPolling]);
    assert_eq!(s.state, GenerationState::TimedOut);
    assert_eq!(s.failure, Some(GenerationError::Timeout));
    assert_eq!(s.poll_count, 3);
}

#[test]
fn test_ready_on_last_poll_wins_over_timeout() {
    let mut s = session(2);
    s.reduce(StateDelta::RequestAnswered(StatusReport::generating()));
    s.reduce(StateDelta::PollAnswered(StatusReport::generating()));
    s.reduce(StateDelta::PollAnswered(StatusReport::ready("u", 2.0)));
    assert_eq!(s.state, GenerationState::Ready);
    assert_eq!(s.failure, None);
}

#[test]
fn test_transient_error_keeps_progress() {
    let mut s = session(60);
    s.reduce(StateDelta::RequestAnswered(StatusReport::generating()));
    s.reduce(StateDelta::PollAnswered(StatusReport::generating()));
    s.reduce(StateDelta::PollAnswered(StatusReport::generating()));
    assert_eq!(s.progress, 20);

    let effects = s.reduce(StateDelta::PollErrored("dns".to_string()));
    assert!(matches!(
        effects.as_slice(),
        [SideEffect::TransientError(GenerationError::TransientPollError(_))]
    ));
    assert_eq!(s.state, GenerationState::Polling);
    assert_eq!(s.progress, 20);
}

#[test]
fn test_deltas_after_terminal_state_are_ignored() {
    let mut s = session(60);
    s.reduce(StateDelta::RequestAnswered(StatusReport::failed(Some("nope"))));
    assert_eq!(s.state, GenerationState::Failed);
    assert_eq!(s.failure, Some(GenerationError::RequestFailed("nope".to_string())));

    assert!(s.reduce(StateDelta::PollAnswered(StatusReport::ready("u", 1.0))).is_empty());
    assert!(s.reduce(StateDelta::RequestErrored("late".to_string())).is_empty());
    assert!(s.reduce(StateDelta::Cancelled).is_empty());
    assert_eq!(s.state, GenerationState::Failed);
    assert_eq!(s.poll_count, 0);
}

#[test]
fn test_voice_presets_parse_kebab_case() {
    assert_eq!("female-formal".parse::<VoicePreset>(), Ok(VoicePreset::FemaleFormal));
    assert!("robot".parse::<VoicePreset>().is_err());
    for voice in VoicePreset::ALL {
        assert_eq!(voice.to_string().parse::<VoicePreset>(), Ok(voice));
    }
}

#[test]
fn test_status_report_wire_format() {
    let report: StatusReport =
        serde_json::from_str(r#"{"status":"ready","audioUrl":"https://x/a.mp3","duration":42}"#)
            .expect("parse");
    assert_eq!(report, StatusReport::ready("https://x/a.mp3", 42.0));

    let failed: StatusReport =
        serde_json::from_str(r#"{"status":"failed"}"#).expect("parse");
    assert_eq!(failed.error, None);
}
