pub mod audio;
pub mod config;
pub mod kernel;
pub mod playback;
pub mod preview;
pub mod services;

mod sync;

pub use config::ClientConfig;
pub use kernel::controller::GenerationController;
pub use kernel::error::GenerationError;
pub use kernel::event::{GenerationRequest, RecordingId, StatusReport, VoicePreset};
pub use kernel::state::{GenerationState, GenerationView};
pub use playback::{PlaybackPositionStore, PlaybackSession};
pub use preview::PreviewPlayer;
