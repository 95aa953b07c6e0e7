use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::effect::SideEffect;
use super::error::GenerationError;
use super::event::{GenerationRequest, GenerationStatus, Invalidation, ReadyAudio, StatusReport};
use super::time::{synthetic_progress, PROGRESS_COMPLETE};

/// Lifecycle of one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationState {
    /// No session, or the last one was cancelled.
    Idle,
    /// Initial generation call in flight.
    Requesting,
    /// Job accepted, waiting on the poll loop.
    Polling,
    Ready,
    Failed,
    TimedOut,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self::Idle
    }
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationState::Ready | GenerationState::Failed | GenerationState::TimedOut
        )
    }

    /// A session in this state owns the recording and rejects new starts.
    pub fn is_active(&self) -> bool {
        matches!(self, GenerationState::Requesting | GenerationState::Polling)
    }
}

/// Requests a lifecycle transition. The graph validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRequest {
    Start,
    Accepted,
    Completed,
    Rejected,
    BudgetExhausted,
    Cancel,
}

pub struct LifecycleGraph;

impl LifecycleGraph {
    /// Pure function: (Current State, Request) -> New State.
    /// Returns None if the transition is invalid.
    pub fn transition(
        current: GenerationState,
        request: LifecycleRequest,
    ) -> Option<GenerationState> {
        use GenerationState::*;
        use LifecycleRequest::*;

        match (current, request) {
            // A terminal state only moves on an explicit new start.
            (Idle | Ready | Failed | TimedOut, Start) => Some(Requesting),

            (Requesting, Accepted) => Some(Polling),
            (Requesting | Polling, Completed) => Some(Ready),
            (Requesting | Polling, Rejected) => Some(Failed),
            (Polling, BudgetExhausted) => Some(TimedOut),

            (Requesting | Polling, Cancel) => Some(Idle),

            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Strict state delta. This is the ONLY way a session mutates.
#[derive(Debug, Clone)]
pub enum StateDelta {
    RequestAnswered(StatusReport),
    RequestErrored(String),
    PollAnswered(StatusReport),
    PollErrored(String),
    Cancelled,
}

/// What the surrounding UI observes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationView {
    pub state: GenerationState,
    pub progress_percent: u8,
    pub error: Option<GenerationError>,
    pub audio: Option<ReadyAudio>,
}

impl GenerationView {
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// State of one generation request, from `Requesting` until it ends.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub id: SessionId,
    pub request: GenerationRequest,
    pub state: GenerationState,
    pub poll_count: u32,
    pub progress: u8,
    pub last_status: Option<StatusReport>,
    pub audio: Option<ReadyAudio>,
    pub failure: Option<GenerationError>,
    max_polls: u32,
}

impl GenerationSession {
    pub fn new(request: GenerationRequest, max_polls: u32) -> Self {
        Self {
            id: SessionId::new(),
            request,
            state: GenerationState::Requesting,
            poll_count: 0,
            progress: 0,
            last_status: None,
            audio: None,
            failure: None,
            max_polls,
        }
    }

    pub fn view(&self) -> GenerationView {
        GenerationView {
            state: self.state,
            progress_percent: self.progress,
            error: self.failure.clone(),
            audio: self.audio.clone(),
        }
    }

    /// Applies one delta and returns the effects the driver must execute.
    /// Deltas that do not fit the current state are ignored.
    pub fn reduce(&mut self, delta: StateDelta) -> Vec<SideEffect> {
        match delta {
            StateDelta::RequestAnswered(report) => {
                if self.state != GenerationState::Requesting {
                    return Vec::new();
                }
                let mut effects = self.apply_report(report, true);
                if self.state == GenerationState::Polling {
                    effects.push(SideEffect::StartPolling);
                }
                effects
            }
            StateDelta::RequestErrored(message) => {
                if self.state != GenerationState::Requesting {
                    return Vec::new();
                }
                self.fail(GenerationError::RequestFailed(format!(
                    "Failed to start audio generation: {message}"
                )))
            }
            StateDelta::PollAnswered(report) => {
                if self.state != GenerationState::Polling {
                    return Vec::new();
                }
                self.poll_count += 1;
                let mut effects = self.apply_report(report, false);
                effects.extend(self.check_budget());
                effects
            }
            StateDelta::PollErrored(message) => {
                if self.state != GenerationState::Polling {
                    return Vec::new();
                }
                self.poll_count += 1;
                let mut effects = vec![SideEffect::TransientError(
                    GenerationError::TransientPollError(message),
                )];
                effects.extend(self.check_budget());
                effects
            }
            StateDelta::Cancelled => {
                if !self.go(LifecycleRequest::Cancel) {
                    return Vec::new();
                }
                self.progress = 0;
                vec![SideEffect::StopPolling]
            }
        }
    }

    fn apply_report(&mut self, report: StatusReport, during_request: bool) -> Vec<SideEffect> {
        self.last_status = Some(report.clone());
        match report.status {
            GenerationStatus::Ready => match report.url {
                Some(url) if !url.trim().is_empty() => {
                    if !self.go(LifecycleRequest::Completed) {
                        return Vec::new();
                    }
                    self.progress = PROGRESS_COMPLETE;
                    self.audio = Some(ReadyAudio {
                        url,
                        duration: report.duration,
                    });
                    let recording_id = self.request.recording_id.clone();
                    vec![
                        SideEffect::StopPolling,
                        SideEffect::Invalidate(Invalidation::GenerationStatus(recording_id)),
                        SideEffect::Invalidate(Invalidation::RecordingList),
                    ]
                }
                _ => self.fail(GenerationError::SynthesisFailed(
                    "Audio is ready but no audio URL was returned".to_string(),
                )),
            },
            GenerationStatus::Failed => self.fail(GenerationError::reported(
                report.error.as_deref(),
                during_request,
            )),
            GenerationStatus::Generating => {
                if during_request {
                    self.go(LifecycleRequest::Accepted);
                } else {
                    self.progress = self.progress.max(synthetic_progress(self.poll_count));
                }
                Vec::new()
            }
        }
    }

    fn check_budget(&mut self) -> Vec<SideEffect> {
        if self.state == GenerationState::Polling
            && self.poll_count >= self.max_polls
            && self.go(LifecycleRequest::BudgetExhausted)
        {
            self.failure = Some(GenerationError::Timeout);
            return vec![SideEffect::StopPolling];
        }
        Vec::new()
    }

    fn fail(&mut self, error: GenerationError) -> Vec<SideEffect> {
        if !self.go(LifecycleRequest::Rejected) {
            return Vec::new();
        }
        self.failure = Some(error);
        vec![SideEffect::StopPolling]
    }

    fn go(&mut self, request: LifecycleRequest) -> bool {
        match LifecycleGraph::transition(self.state, request) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }
}
