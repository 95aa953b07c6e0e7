use serde::{Deserialize, Serialize};

use crate::kernel::state::{GenerationState, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    GenerationLifecycle {
        session_id: SessionId,
        from: GenerationState,
        to: GenerationState,
    },

    PollCompleted {
        session_id: SessionId,
        poll: u32,
        outcome: PollOutcome,
    },

    /// A new `start` refused because a session was still active.
    StartRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollOutcome {
    Generating,
    Ready,
    Failed,
    TransientError,
}
