use anyhow::Result;
use async_trait::async_trait;

use crate::kernel::event::{GenerationRequest, RecordingId, StatusReport};

pub mod client;
pub mod stub;

pub use client::HttpGenerationApi;
pub use stub::ScriptedGenerationApi;

/// The server side of audio generation, as the controller consumes it.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Asks the server to synthesize audio for the recording.
    async fn request_generation(&self, request: &GenerationRequest) -> Result<StatusReport>;

    /// Current status of the recording's generation job.
    async fn query_status(&self, recording_id: &RecordingId) -> Result<StatusReport>;
}
