//! Seam between the client and whatever actually plays audio.

use anyhow::Result;

pub mod mock;

pub type HandleId = u64;

/// Events a media element reports back while it plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    CanPlay,
    Play,
    Pause,
    TimeUpdate(f64),
    Ended,
    Error,
}

/// One opened audio source. Owned by exactly one player.
pub trait AudioHandle: Send {
    fn id(&self) -> HandleId;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    /// Stops playback and frees the underlying resource. Idempotent.
    fn release(&mut self);
}

pub trait AudioOutput: Send + Sync {
    fn open(&self, source: &str) -> Result<Box<dyn AudioHandle>>;
}
