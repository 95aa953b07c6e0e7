use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::effect::SideEffect;
use super::error::GenerationError;
use super::event::{GenerationRequest, GenerationStatus, Invalidation, RecordingId};
use super::registry::SessionRegistry;
use super::state::{
    GenerationSession, GenerationState, GenerationView, LifecycleGraph, LifecycleRequest,
    SessionId, StateDelta,
};
use super::telemetry::event::{PollOutcome, TelemetryEvent};
use super::telemetry::metrics::TelemetrySnapshot;
use super::telemetry::recorder::TelemetryRecorder;
use crate::config::PollConfig;
use crate::services::api::GenerationApi;
use crate::sync::lock;

const INVALIDATION_CAPACITY: usize = 16;

/// Drives one audio-generation request at a time, from `start` to a
/// terminal state.
///
/// The controller is shared by reference (`Arc<GenerationController>`) so
/// that `cancel` can run while `start` is awaiting the API. Dropping the last
/// reference cancels the active session and releases its poll timer.
pub struct GenerationController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    api: Arc<dyn GenerationApi>,
    config: PollConfig,
    registry: Arc<SessionRegistry>,
    slot: Mutex<Option<ActiveSession>>,
    view_tx: watch::Sender<GenerationView>,
    invalidation_tx: broadcast::Sender<Invalidation>,
    telemetry: Mutex<TelemetryRecorder>,
}

/// A session plus the resources it owns exclusively.
struct ActiveSession {
    session: GenerationSession,
    token: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn release(&mut self, registry: &SessionRegistry) {
        self.token.cancel();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        registry.release(&self.session.request.recording_id, self.session.id);
    }
}

impl GenerationController {
    pub fn new(api: Arc<dyn GenerationApi>, config: PollConfig) -> Self {
        Self::with_registry(api, config, Arc::new(SessionRegistry::new()))
    }

    /// Controllers built over the same registry refuse to run concurrent
    /// sessions for one recording.
    pub fn with_registry(
        api: Arc<dyn GenerationApi>,
        config: PollConfig,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        let (view_tx, _) = watch::channel(GenerationView::default());
        let (invalidation_tx, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                api,
                config,
                registry,
                slot: Mutex::new(None),
                view_tx,
                invalidation_tx,
                telemetry: Mutex::new(TelemetryRecorder::new()),
            }),
        }
    }

    /// Submits the request and settles the initial response.
    ///
    /// Returns the state reached once the initial call resolved: `Ready` or
    /// `Failed` straight away, `Polling` while the poll loop runs in the
    /// background, or `Idle` if the session was cancelled meanwhile.
    pub async fn start(&self, request: GenerationRequest) -> Result<GenerationState, GenerationError> {
        let (session_id, token) = self.inner.begin(request.clone())?;

        let response = tokio::select! {
            _ = token.cancelled() => {
                debug!(recording = %request.recording_id, "generation request abandoned after cancel");
                return Ok(self.state());
            }
            response = self.inner.api.request_generation(&request) => response,
        };

        let delta = match response {
            Ok(report) => StateDelta::RequestAnswered(report),
            Err(e) => StateDelta::RequestErrored(format!("{e:#}")),
        };
        ControllerInner::apply(&self.inner, session_id, delta);
        Ok(self.state())
    }

    /// Stops observing the active session. The server-side job, if already
    /// accepted, is not undone.
    pub fn cancel(&self) {
        let mut slot = lock(&self.inner.slot);
        let Some(active) = slot.as_mut() else {
            return;
        };
        if !active.session.state.is_active() {
            return;
        }

        let from = active.session.state;
        let effects = active.session.reduce(StateDelta::Cancelled);
        self.inner.execute(active, effects);
        info!(recording = %active.session.request.recording_id, "audio generation cancelled");
        self.inner.record_transition(active.session.id, from, active.session.state);
        *slot = None;
        self.inner.view_tx.send_replace(GenerationView::default());
    }

    pub fn state(&self) -> GenerationState {
        self.inner.view_tx.borrow().state
    }

    pub fn view(&self) -> GenerationView {
        self.inner.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationView> {
        self.inner.view_tx.subscribe()
    }

    pub fn invalidations(&self) -> broadcast::Receiver<Invalidation> {
        self.inner.invalidation_tx.subscribe()
    }

    /// Polls completed by the current session, if any.
    pub fn poll_count(&self) -> u32 {
        lock(&self.inner.slot)
            .as_ref()
            .map_or(0, |active| active.session.poll_count)
    }

    /// True while a poll timer is owned and still running.
    pub fn has_live_timer(&self) -> bool {
        lock(&self.inner.slot)
            .as_ref()
            .and_then(|active| active.timer.as_ref())
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        lock(&self.inner.telemetry).snapshot()
    }
}

impl Drop for GenerationController {
    fn drop(&mut self) {
        if let Some(active) = lock(&self.inner.slot).as_mut() {
            active.release(&self.inner.registry);
        }
    }
}

impl ControllerInner {
    fn begin(&self, request: GenerationRequest) -> Result<(SessionId, CancellationToken), GenerationError> {
        let mut slot = lock(&self.slot);
        let current = slot
            .as_ref()
            .map_or(GenerationState::Idle, |active| active.session.state);

        if LifecycleGraph::transition(current, LifecycleRequest::Start).is_none() {
            lock(&self.telemetry).record(TelemetryEvent::StartRejected);
            return Err(GenerationError::AlreadyInProgress);
        }

        let session = GenerationSession::new(request, self.config.max_polls);
        if let Err(e) = self.registry.claim(&session.request.recording_id, session.id) {
            lock(&self.telemetry).record(TelemetryEvent::StartRejected);
            return Err(e);
        }

        info!(
            recording = %session.request.recording_id,
            user_voice = %session.request.user_voice,
            assistant_voice = %session.request.assistant_voice,
            "audio generation requested"
        );
        self.record_transition(session.id, current, session.state);

        let id = session.id;
        let token = CancellationToken::new();
        self.view_tx.send_replace(session.view());
        *slot = Some(ActiveSession {
            session,
            token: token.clone(),
            timer: None,
        });
        Ok((id, token))
    }

    /// Applies a delta to the session it was produced for. Returns whether
    /// that session is still polling.
    fn apply(inner: &Arc<Self>, session_id: SessionId, delta: StateDelta) -> bool {
        let mut slot = lock(&inner.slot);
        let Some(active) = slot.as_mut() else {
            debug!("discarding response for a session that no longer exists");
            return false;
        };
        if active.session.id != session_id || active.token.is_cancelled() {
            debug!("discarding stale response");
            return false;
        }

        let from = active.session.state;
        let poll = match &delta {
            StateDelta::PollAnswered(report) => Some(match report.status {
                GenerationStatus::Ready => PollOutcome::Ready,
                GenerationStatus::Failed => PollOutcome::Failed,
                GenerationStatus::Generating => PollOutcome::Generating,
            }),
            StateDelta::PollErrored(_) => Some(PollOutcome::TransientError),
            _ => None,
        };

        let effects = active.session.reduce(delta);
        if effects.contains(&SideEffect::StartPolling) {
            active.timer = Some(tokio::spawn(poll_loop(
                Arc::clone(inner),
                session_id,
                active.session.request.recording_id.clone(),
                active.token.clone(),
            )));
        }
        inner.execute(active, effects);

        if let Some(outcome) = poll {
            lock(&inner.telemetry).record(TelemetryEvent::PollCompleted {
                session_id,
                poll: active.session.poll_count,
                outcome,
            });
        }

        let to = active.session.state;
        if from != to {
            match &active.session.failure {
                Some(failure) => warn!(recording = %active.session.request.recording_id, ?to, "audio generation ended: {}", failure),
                None => info!(recording = %active.session.request.recording_id, ?from, ?to, "audio generation state changed"),
            }
            inner.record_transition(session_id, from, to);
        }

        inner.view_tx.send_replace(active.session.view());
        to == GenerationState::Polling
    }

    fn execute(&self, active: &mut ActiveSession, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                // Spawned by `apply`, which holds the Arc the task needs.
                SideEffect::StartPolling => {}
                SideEffect::StopPolling => active.release(&self.registry),
                SideEffect::Invalidate(invalidation) => {
                    // No subscribers is fine: nothing is cached.
                    let _ = self.invalidation_tx.send(invalidation);
                }
                SideEffect::TransientError(e) => {
                    warn!(
                        recording = %active.session.request.recording_id,
                        poll = active.session.poll_count,
                        "{}; retrying on next tick", e
                    );
                }
            }
        }
    }

    fn record_transition(&self, session_id: SessionId, from: GenerationState, to: GenerationState) {
        lock(&self.telemetry).record(TelemetryEvent::GenerationLifecycle {
            session_id,
            from,
            to,
        });
    }
}

/// Status loop for one session. Exits when the session stops polling or its
/// token is cancelled; responses that resolve after cancellation are dropped.
async fn poll_loop(
    inner: Arc<ControllerInner>,
    session_id: SessionId,
    recording_id: RecordingId,
    token: CancellationToken,
) {
    let period = inner.config.interval();
    let mut cadence = interval_at(Instant::now() + period, period);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = cadence.tick() => {}
        }

        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = inner.api.query_status(&recording_id) => result,
        };

        let delta = match result {
            Ok(report) => StateDelta::PollAnswered(report),
            Err(e) => StateDelta::PollErrored(format!("{e:#}")),
        };
        if !ControllerInner::apply(&inner, session_id, delta) {
            break;
        }
    }

    debug!(recording = %recording_id, "poll timer released");
}
