use serde_json::Value;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use duet_audio::audio::mock::MockAudioOutput;
use duet_audio::audio::MediaEvent;
use duet_audio::kernel::event::{ReadyAudio, RecordingId};
use duet_audio::playback::store::position_key;
use duet_audio::playback::store::StoreError;
use duet_audio::playback::{InMemoryPositionBackend, PlaybackPositionStore, PlaybackSession, PositionBackend};

const AUTOSAVE: Duration = Duration::from_millis(5_000);

fn temp_store_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("duet-audio-{}-{}.json", name, uuid::Uuid::new_v4()))
}

fn audio(duration: f64) -> ReadyAudio {
    ReadyAudio {
        url: "https://cdn.example/c1.mp3".to_string(),
        duration: Some(duration),
    }
}

fn open(store: &PlaybackPositionStore, output: &MockAudioOutput) -> PlaybackSession {
    PlaybackSession::open(RecordingId::from("c1"), &audio(120.0), output, store.clone(), AUTOSAVE)
        .expect("session opens")
}

/// Backend whose first write parks until the test lets it through.
struct SlowWriteBackend {
    inner: InMemoryPositionBackend,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl PositionBackend for SlowWriteBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let entered = self.entered.lock().unwrap().take();
        if let Some(entered) = entered {
            let _ = entered.send(());
            let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(5));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

#[test]
fn test_save_then_load_after_reload() {
    let path = temp_store_path("roundtrip");
    let id = RecordingId::from("c1");

    let store = PlaybackPositionStore::file(&path);
    store.save(&id, 37.5);

    // Simulated reload: a fresh store over the same file.
    let reloaded = PlaybackPositionStore::file(&path);
    assert_eq!(reloaded.load(&id), Some(37.5));

    reloaded.clear(&id);
    assert_eq!(PlaybackPositionStore::file(&path).load(&id), None);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_zero_and_invalid_offsets_leave_no_entry() {
    let store = PlaybackPositionStore::in_memory();
    let id = RecordingId::from("c1");

    store.save(&id, 12.0);
    store.save(&id, 0.0);
    assert_eq!(store.load(&id), None, "Zero progress is not persisted");

    store.save(&id, f64::NAN);
    store.save(&id, -3.0);
    assert_eq!(store.load(&id), None);
}

#[test]
fn test_malformed_entries_read_as_absent() {
    let backend = Arc::new(InMemoryPositionBackend::new());
    let store = PlaybackPositionStore::new(backend.clone());
    let id = RecordingId::from("c1");
    let key = position_key(&id);

    backend.set(&key, Value::String("not a number".into())).expect("set");
    assert_eq!(store.load(&id), None);

    backend.set(&key, Value::Bool(true)).expect("set");
    assert_eq!(store.load(&id), None);

    // Stringly-typed numbers, as written by some older clients, still resume.
    backend.set(&key, Value::String("19.25".into())).expect("set");
    assert_eq!(store.load(&id), Some(19.25));
}

#[test]
fn test_corrupt_file_starts_empty() {
    let path = temp_store_path("corrupt");
    std::fs::write(&path, "{ this is not json").expect("write garbage");

    let store = PlaybackPositionStore::file(&path);
    let id = RecordingId::from("c1");
    assert_eq!(store.load(&id), None);

    store.save(&id, 8.0);
    assert_eq!(PlaybackPositionStore::file(&path).load(&id), Some(8.0));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_only_while_playing() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    let id = RecordingId::from("c1");
    let mut session = open(&store, &output);

    session.handle_event(MediaEvent::CanPlay);
    session.play().expect("play");
    session.handle_event(MediaEvent::TimeUpdate(37.5));

    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(store.load(&id), Some(37.5), "Autosaved while playing");

    session.pause();
    session.handle_event(MediaEvent::TimeUpdate(50.0));
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(store.load(&id), Some(37.5), "Nothing written while paused");

    session.handle_event(MediaEvent::Play);
    session.handle_event(MediaEvent::TimeUpdate(61.0));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.load(&id), Some(61.0));
}

#[tokio::test(start_paused = true)]
async fn test_close_flushes_before_autosave_fires() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    let id = RecordingId::from("c1");
    let mut session = open(&store, &output);

    session.handle_event(MediaEvent::CanPlay);
    session.play().expect("play");
    session.handle_event(MediaEvent::TimeUpdate(12.0));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.load(&id), None);

    session.close();
    assert_eq!(store.load(&id), Some(12.0));
    assert!(session.is_closed());
    assert!(output.live_handles().is_empty(), "Media handle released");

    // Autosave stopped with the session.
    store.clear(&id);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.load(&id), None);
}

#[tokio::test(start_paused = true)]
async fn test_drop_behaves_like_close() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    {
        let mut session = open(&store, &output);
        session.handle_event(MediaEvent::CanPlay);
        session.seek(44.0);
    }
    assert_eq!(store.load(&RecordingId::from("c1")), Some(44.0));
    assert!(output.live_handles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resumes_from_saved_offset() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    store.save(&RecordingId::from("c1"), 30.0);

    let mut session = open(&store, &output);
    assert!(session.status().is_loading);
    assert_eq!(session.status().current_time, 0.0);

    session.handle_event(MediaEvent::CanPlay);
    let status = session.status();
    assert!(!status.is_loading);
    assert_eq!(status.current_time, 30.0);

    let handle = &output.handles()[0];
    assert_eq!(handle.source, "https://cdn.example/c1.mp3");
    assert_eq!(handle.seeks, vec![30.0]);
}

#[tokio::test(start_paused = true)]
async fn test_closing_before_ready_keeps_saved_offset() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    let id = RecordingId::from("c1");
    store.save(&id, 30.0);

    let mut session = open(&store, &output);
    session.close();
    assert_eq!(store.load(&id), Some(30.0));
}

#[tokio::test(start_paused = true)]
async fn test_offset_past_duration_is_not_resumed() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    store.save(&RecordingId::from("c1"), 130.0);

    let mut session = open(&store, &output);
    session.handle_event(MediaEvent::CanPlay);

    assert_eq!(session.status().current_time, 0.0);
    assert!(output.handles()[0].seeks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_clears_position() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    let id = RecordingId::from("c1");
    let mut session = open(&store, &output);

    session.handle_event(MediaEvent::CanPlay);
    session.play().expect("play");
    session.handle_event(MediaEvent::TimeUpdate(100.0));
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(store.load(&id), Some(100.0));

    session.handle_event(MediaEvent::TimeUpdate(120.0));
    session.handle_event(MediaEvent::Ended);
    let status = session.status();
    assert!(!status.is_playing);
    assert!(status.completed);
    assert_eq!(store.load(&id), None);

    session.close();
    assert_eq!(store.load(&id), None, "A finished recording restarts from zero");
}

#[tokio::test(start_paused = true)]
async fn test_seek_is_clamped_to_duration() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    let mut session = open(&store, &output);

    session.seek(500.0);
    assert_eq!(session.status().current_time, 120.0);
    session.seek(-4.0);
    assert_eq!(session.status().current_time, 0.0);
    assert_eq!(output.handles()[0].seeks, vec![120.0, 0.0]);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_and_media_errors() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    let mut session = open(&store, &output);
    session.handle_event(MediaEvent::CanPlay);

    session.toggle().expect("play");
    assert!(session.status().is_playing);
    assert!(output.handles()[0].playing);

    session.toggle().expect("pause");
    assert!(!session.status().is_playing);

    session.handle_event(MediaEvent::Play);
    session.handle_event(MediaEvent::Error);
    let status = session.status();
    assert!(!status.is_playing);
    assert!(!status.is_loading);

    session.close();
    assert!(session.play().is_err(), "Closed sessions refuse to play");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_autosave_in_flight_cannot_outlive_natural_end() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let backend = Arc::new(SlowWriteBackend {
        inner: InMemoryPositionBackend::new(),
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(release_rx),
    });
    let store = PlaybackPositionStore::new(backend);
    let output = MockAudioOutput::new();
    let id = RecordingId::from("c1");

    let mut session = PlaybackSession::open(
        id.clone(),
        &audio(120.0),
        &output,
        store.clone(),
        Duration::from_millis(50),
    )
    .expect("session opens");
    session.handle_event(MediaEvent::CanPlay);
    session.play().expect("play");
    session.handle_event(MediaEvent::TimeUpdate(41.5));

    // Wait until an autosave write is parked inside the backend.
    tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
        .await
        .expect("join")
        .expect("autosave reached the backend");

    let releaser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        let _ = release_tx.send(());
    });
    session.handle_event(MediaEvent::Ended);
    releaser.join().expect("releaser");
    session.close();

    assert_eq!(store.load(&id), None, "A finished recording restarts from zero");
}

#[tokio::test(start_paused = true)]
async fn test_close_without_can_play_keeps_progress() {
    let store = PlaybackPositionStore::in_memory();
    let output = MockAudioOutput::new();
    let id = RecordingId::from("c1");
    store.save(&id, 30.0);

    let mut session = open(&store, &output);
    session.handle_event(MediaEvent::Play);
    session.handle_event(MediaEvent::TimeUpdate(12.0));
    session.close();

    assert_eq!(store.load(&id), Some(12.0));
}
