use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audio::{AudioHandle, AudioOutput, HandleId, MediaEvent};
use crate::kernel::event::VoicePreset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    Started(HandleId),
    /// The requested voice was already playing and has been toggled off.
    Stopped,
}

struct ActivePreview {
    voice: VoicePreset,
    handle: Box<dyn AudioHandle>,
}

/// Plays short voice samples while the user picks voices. At most one sample
/// plays at a time.
pub struct PreviewPlayer {
    output: Arc<dyn AudioOutput>,
    samples_base_url: String,
    active: Option<ActivePreview>,
}

impl PreviewPlayer {
    pub fn new(output: Arc<dyn AudioOutput>, samples_base_url: impl Into<String>) -> Self {
        Self {
            output,
            samples_base_url: samples_base_url.into().trim_end_matches('/').to_string(),
            active: None,
        }
    }

    pub fn sample_url(&self, voice: VoicePreset) -> String {
        format!("{}/{}.mp3", self.samples_base_url, voice)
    }

    /// Starts the sample for `voice`, stopping whatever else was playing.
    /// Asking for the voice that is already playing stops it instead.
    pub fn preview(&mut self, voice: VoicePreset) -> Result<PreviewOutcome> {
        if let Some(previous) = self.active.take() {
            let same = previous.voice == voice;
            Self::release(previous);
            if same {
                return Ok(PreviewOutcome::Stopped);
            }
        }

        let mut handle = self
            .output
            .open(&self.sample_url(voice))
            .with_context(|| format!("failed to open preview for {voice}"))?;
        if let Err(e) = handle.play() {
            handle.release();
            return Err(e.context(format!("failed to play preview for {voice}")));
        }

        let id = handle.id();
        debug!(%voice, handle = id, "voice preview started");
        self.active = Some(ActivePreview { voice, handle });
        Ok(PreviewOutcome::Started(id))
    }

    /// Feeds a media event from the handle `handle_id`. Events from handles
    /// that are no longer active are ignored.
    pub fn handle_event(&mut self, handle_id: HandleId, event: MediaEvent) {
        let owns = self
            .active
            .as_ref()
            .is_some_and(|active| active.handle.id() == handle_id);
        if !owns {
            return;
        }

        match event {
            MediaEvent::Ended | MediaEvent::Error => {
                if event == MediaEvent::Error {
                    warn!(handle = handle_id, "voice preview failed");
                }
                if let Some(active) = self.active.take() {
                    Self::release(active);
                }
            }
            _ => {}
        }
    }

    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            Self::release(active);
        }
    }

    pub fn active_voice(&self) -> Option<VoicePreset> {
        self.active.as_ref().map(|active| active.voice)
    }

    pub fn is_previewing(&self, voice: VoicePreset) -> bool {
        self.active_voice() == Some(voice)
    }

    fn release(mut active: ActivePreview) {
        active.handle.release();
        debug!(voice = %active.voice, "voice preview released");
    }
}

impl Drop for PreviewPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
