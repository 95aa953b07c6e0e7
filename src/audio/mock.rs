use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{AudioHandle, AudioOutput, HandleId};
use crate::sync::lock;

/// What a mock handle has been asked to do so far.
#[derive(Debug, Clone, PartialEq)]
pub struct MockHandleState {
    pub id: HandleId,
    pub source: String,
    pub playing: bool,
    pub released: bool,
    pub position: f64,
    pub seeks: Vec<f64>,
}

/// In-memory output that records every handle it opens.
#[derive(Debug, Default, Clone)]
pub struct MockAudioOutput {
    handles: Arc<Mutex<Vec<MockHandleState>>>,
    next_id: Arc<AtomicU64>,
    fail_next_play: Arc<AtomicBool>,
}

impl MockAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `play` on any handle returns an error.
    pub fn fail_next_play(&self) {
        self.fail_next_play.store(true, Ordering::SeqCst);
    }

    pub fn handles(&self) -> Vec<MockHandleState> {
        lock(&self.handles).clone()
    }

    pub fn handle(&self, id: HandleId) -> Option<MockHandleState> {
        lock(&self.handles).iter().find(|h| h.id == id).cloned()
    }

    pub fn live_handles(&self) -> Vec<MockHandleState> {
        lock(&self.handles)
            .iter()
            .filter(|h| !h.released)
            .cloned()
            .collect()
    }
}

impl AudioOutput for MockAudioOutput {
    fn open(&self, source: &str) -> Result<Box<dyn AudioHandle>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.handles).push(MockHandleState {
            id,
            source: source.to_string(),
            playing: false,
            released: false,
            position: 0.0,
            seeks: Vec::new(),
        });
        Ok(Box::new(MockHandle {
            id,
            output: self.clone(),
        }))
    }
}

struct MockHandle {
    id: HandleId,
    output: MockAudioOutput,
}

impl MockHandle {
    fn update(&self, f: impl FnOnce(&mut MockHandleState)) {
        if let Some(state) = lock(&self.output.handles).iter_mut().find(|h| h.id == self.id) {
            f(state);
        }
    }
}

impl AudioHandle for MockHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn play(&mut self) -> Result<()> {
        if self.output.fail_next_play.swap(false, Ordering::SeqCst) {
            bail!("playback refused");
        }
        let mut released = false;
        self.update(|h| {
            released = h.released;
            if !h.released {
                h.playing = true;
            }
        });
        if released {
            bail!("handle {} already released", self.id);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.update(|h| h.playing = false);
    }

    fn seek(&mut self, seconds: f64) {
        self.update(|h| {
            h.position = seconds;
            h.seeks.push(seconds);
        });
    }

    fn release(&mut self) {
        self.update(|h| {
            h.playing = false;
            h.released = true;
        });
    }
}
