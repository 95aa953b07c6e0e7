use std::collections::HashMap;
use std::sync::Mutex;

use super::error::GenerationError;
use super::event::RecordingId;
use super::state::SessionId;
use crate::sync::lock;

/// Tracks which session currently owns each recording.
///
/// A controller always claims its recording here before requesting
/// generation, so controllers sharing one registry can never run two
/// sessions for the same recording.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashMap<RecordingId, SessionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(
        &self,
        recording_id: &RecordingId,
        session_id: SessionId,
    ) -> Result<(), GenerationError> {
        let mut active = lock(&self.active);
        match active.get(recording_id) {
            Some(owner) if *owner != session_id => Err(GenerationError::AlreadyInProgress),
            _ => {
                active.insert(recording_id.clone(), session_id);
                Ok(())
            }
        }
    }

    /// Releases the claim only if `session_id` still owns it.
    pub fn release(&self, recording_id: &RecordingId, session_id: SessionId) {
        let mut active = lock(&self.active);
        if active.get(recording_id) == Some(&session_id) {
            active.remove(recording_id);
        }
    }

    pub fn owner(&self, recording_id: &RecordingId) -> Option<SessionId> {
        lock(&self.active).get(recording_id).copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
