use std::collections::VecDeque;

use super::event::{PollOutcome, TelemetryEvent};
use crate::kernel::state::GenerationState;

#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub session_stats: SessionStats,
    pub poll_stats: PollStats,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub started: u64,
    pub ready: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub rejected_starts: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PollStats {
    pub total_polls: u64,
    pub transient_errors: u64,
    /// Mean poll count of sessions that reached `Ready` through the loop.
    pub avg_polls_to_ready: f64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    let mut polled_ready = 0u64;
    let mut polls_to_ready = 0u64;

    for event in events {
        match event {
            TelemetryEvent::GenerationLifecycle { from, to, .. } => match to {
                GenerationState::Requesting => snap.session_stats.started += 1,
                GenerationState::Ready => snap.session_stats.ready += 1,
                GenerationState::Failed => snap.session_stats.failed += 1,
                GenerationState::TimedOut => snap.session_stats.timed_out += 1,
                GenerationState::Idle if from.is_active() => snap.session_stats.cancelled += 1,
                _ => {}
            },
            TelemetryEvent::PollCompleted { poll, outcome, .. } => {
                snap.poll_stats.total_polls += 1;
                match outcome {
                    PollOutcome::TransientError => snap.poll_stats.transient_errors += 1,
                    PollOutcome::Ready => {
                        polled_ready += 1;
                        polls_to_ready += u64::from(*poll);
                    }
                    _ => {}
                }
            }
            TelemetryEvent::StartRejected => snap.session_stats.rejected_starts += 1,
        }
    }

    if polled_ready > 0 {
        snap.poll_stats.avg_polls_to_ready = polls_to_ready as f64 / polled_ready as f64;
    }

    snap
}
