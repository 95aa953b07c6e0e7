use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::kernel::event::RecordingId;
use crate::sync::lock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("position store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("position store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable local key/value storage for playback positions.
pub trait PositionBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local backend. Survives a simulated reload as long as the same
/// instance is reused.
#[derive(Debug, Default)]
pub struct InMemoryPositionBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl InMemoryPositionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionBackend for InMemoryPositionBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// JSON object file of key -> value. Every write rewrites the whole file
/// through a temp file and rename.
#[derive(Debug)]
pub struct FilePositionBackend {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FilePositionBackend {
    /// Opens the file at `path`. A missing or malformed file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring unreadable position file: {}", e);
            Map::new()
        });
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn read(path: &Path) -> Result<Map<String, Value>, StoreError> {
        if !path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PositionBackend for FilePositionBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

pub fn position_key(recording_id: &RecordingId) -> String {
    format!("audio-position-{}", recording_id)
}

/// Best-effort resume offsets per recording.
///
/// Nothing here fails: backend errors are logged and dropped, and a lost
/// offset just means playback restarts from zero. An entry only exists for
/// partial progress; zero, negative or non-finite offsets clear it.
#[derive(Clone)]
pub struct PlaybackPositionStore {
    backend: Arc<dyn PositionBackend>,
}

impl PlaybackPositionStore {
    pub fn new(backend: Arc<dyn PositionBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPositionBackend::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FilePositionBackend::open(path)))
    }

    pub fn load(&self, recording_id: &RecordingId) -> Option<f64> {
        let value = match self.backend.get(&position_key(recording_id)) {
            Ok(value) => value?,
            Err(e) => {
                warn!(recording = %recording_id, "failed to read playback position: {}", e);
                return None;
            }
        };

        let offset = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        offset.filter(|o| o.is_finite() && *o > 0.0)
    }

    pub fn save(&self, recording_id: &RecordingId, offset_seconds: f64) {
        if !offset_seconds.is_finite() || offset_seconds <= 0.0 {
            self.clear(recording_id);
            return;
        }
        let Some(value) = serde_json::Number::from_f64(offset_seconds) else {
            return;
        };
        if let Err(e) = self.backend.set(&position_key(recording_id), Value::Number(value)) {
            warn!(recording = %recording_id, "failed to save playback position: {}", e);
        }
    }

    pub fn clear(&self, recording_id: &RecordingId) {
        if let Err(e) = self.backend.remove(&position_key(recording_id)) {
            warn!(recording = %recording_id, "failed to clear playback position: {}", e);
        }
    }

    /// Final write when a playback surface closes.
    pub fn flush(&self, recording_id: &RecordingId, offset_seconds: f64) {
        debug!(recording = %recording_id, offset_seconds, "flushing playback position");
        self.save(recording_id, offset_seconds);
    }
}
