use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::PlaybackPositionStore;
use crate::audio::{AudioHandle, AudioOutput, MediaEvent};
use crate::kernel::event::{ReadyAudio, RecordingId};
use crate::sync::lock;

/// What the playback surface shows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    pub current_time: f64,
    pub is_loading: bool,
    /// Reached the natural end; nothing is persisted for a completed play.
    pub completed: bool,
}

struct Autosave {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Playback of one generated recording, resuming from and persisting its
/// last position.
///
/// Must be opened inside a tokio runtime: the autosave timer runs as a task.
pub struct PlaybackSession {
    recording_id: RecordingId,
    duration: Option<f64>,
    handle: Option<Box<dyn AudioHandle>>,
    status: Arc<Mutex<PlaybackStatus>>,
    store: PlaybackPositionStore,
    resume_from: Option<f64>,
    autosave: Option<Autosave>,
}

impl PlaybackSession {
    pub fn open(
        recording_id: RecordingId,
        audio: &ReadyAudio,
        output: &dyn AudioOutput,
        store: PlaybackPositionStore,
        autosave_interval: Duration,
    ) -> Result<Self> {
        let handle = output
            .open(&audio.url)
            .with_context(|| format!("failed to open audio for recording {recording_id}"))?;

        let resume_from = store.load(&recording_id);
        let status = Arc::new(Mutex::new(PlaybackStatus {
            is_loading: true,
            ..PlaybackStatus::default()
        }));

        let token = CancellationToken::new();
        let task = tokio::spawn(autosave_loop(
            recording_id.clone(),
            Arc::clone(&status),
            store.clone(),
            autosave_interval,
            token.clone(),
        ));

        debug!(recording = %recording_id, ?resume_from, "playback session opened");
        Ok(Self {
            recording_id,
            duration: audio.duration.filter(|d| d.is_finite() && *d > 0.0),
            handle: Some(handle),
            status,
            store,
            resume_from,
            autosave: Some(Autosave { token, task }),
        })
    }

    pub fn status(&self) -> PlaybackStatus {
        *lock(&self.status)
    }

    pub fn recording_id(&self) -> &RecordingId {
        &self.recording_id
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Applies an event reported by the media element.
    pub fn handle_event(&mut self, event: MediaEvent) {
        if self.handle.is_none() {
            return;
        }

        match event {
            MediaEvent::CanPlay => {
                if let Some(offset) = self.resume_from.take() {
                    if self.duration.map_or(true, |d| offset < d) {
                        if let Some(handle) = self.handle.as_mut() {
                            handle.seek(offset);
                        }
                        lock(&self.status).current_time = offset;
                        info!(recording = %self.recording_id, offset, "resuming playback");
                    }
                }
                lock(&self.status).is_loading = false;
            }
            MediaEvent::Play => {
                let mut status = lock(&self.status);
                status.is_playing = true;
                status.completed = false;
            }
            MediaEvent::Pause => lock(&self.status).is_playing = false,
            MediaEvent::TimeUpdate(t) => {
                if t.is_finite() && t >= 0.0 {
                    lock(&self.status).current_time = t;
                    // Playback moved on without a CanPlay; its position wins.
                    if t > 0.0 {
                        self.resume_from = None;
                    }
                }
            }
            MediaEvent::Ended => {
                // Cleared under the status lock so an autosave write in flight
                // cannot land after it.
                let mut status = lock(&self.status);
                status.is_playing = false;
                status.current_time = 0.0;
                status.completed = true;
                self.store.clear(&self.recording_id);
                drop(status);
                debug!(recording = %self.recording_id, "playback completed");
            }
            MediaEvent::Error => {
                let mut status = lock(&self.status);
                status.is_playing = false;
                status.is_loading = false;
                warn!(recording = %self.recording_id, "media playback error");
            }
        }
    }

    pub fn play(&mut self) -> Result<()> {
        let handle = self.handle.as_mut().context("playback session is closed")?;
        handle.play()?;
        let mut status = lock(&self.status);
        status.is_playing = true;
        status.completed = false;
        Ok(())
    }

    pub fn pause(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.pause();
            lock(&self.status).is_playing = false;
        }
    }

    pub fn toggle(&mut self) -> Result<()> {
        if self.status().is_playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Moves to `seconds`, clamped to the known duration.
    pub fn seek(&mut self, seconds: f64) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if !seconds.is_finite() {
            return;
        }
        let target = match self.duration {
            Some(d) => seconds.clamp(0.0, d),
            None => seconds.max(0.0),
        };
        handle.seek(target);
        self.resume_from = None;
        let mut status = lock(&self.status);
        status.current_time = target;
        status.completed = false;
    }

    /// Stops autosave, writes the last offset and releases the media handle.
    pub fn close(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        if let Some(autosave) = self.autosave.take() {
            autosave.token.cancel();
            autosave.task.abort();
        }

        let mut status = lock(&self.status);
        status.is_playing = false;
        // A resume offset never applied is still the newest position on disk.
        if !status.completed && self.resume_from.is_none() {
            self.store.flush(&self.recording_id, status.current_time);
        }
        drop(status);

        handle.release();
        debug!(recording = %self.recording_id, "playback session closed");
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn autosave_loop(
    recording_id: RecordingId,
    status: Arc<Mutex<PlaybackStatus>>,
    store: PlaybackPositionStore,
    period: Duration,
    token: CancellationToken,
) {
    let mut cadence = interval_at(Instant::now() + period, period);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = cadence.tick() => {
                let status = Arc::clone(&status);
                let store = store.clone();
                let recording_id = recording_id.clone();
                let write = tokio::task::spawn_blocking(move || {
                    autosave_tick(&recording_id, &status, &store)
                });
                if let Err(e) = write.await {
                    warn!("autosave write did not complete: {}", e);
                }
            }
        }
    }
}

/// Saves the current offset while playing. The status lock is held across the
/// write so `Ended` and `close` observe it either before or after, never during.
fn autosave_tick(
    recording_id: &RecordingId,
    status: &Mutex<PlaybackStatus>,
    store: &PlaybackPositionStore,
) {
    let status = lock(status);
    if status.is_playing && !status.completed {
        store.save(recording_id, status.current_time);
    }
}
