use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::GenerationApi;
use crate::config::ClientConfig;
use crate::kernel::event::{GenerationRequest, RecordingId, StatusReport, VoicePreset};

#[derive(Clone)]
pub struct HttpGenerationApi {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    user_voice: VoicePreset,
    assistant_voice: VoicePreset,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl HttpGenerationApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    fn audio_url(&self, recording_id: &RecordingId) -> String {
        format!("{}/recordings/{}/audio", self.base_url, recording_id)
    }

    async fn decode(response: Response) -> Result<StatusReport> {
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error);
            return Err(match detail {
                Some(message) => anyhow!("{} ({})", message, status),
                None => anyhow!("Audio API error: {}", status),
            });
        }
        response
            .json::<StatusReport>()
            .await
            .context("malformed audio status response")
    }
}

#[async_trait]
impl GenerationApi for HttpGenerationApi {
    async fn request_generation(&self, request: &GenerationRequest) -> Result<StatusReport> {
        let body = GenerateBody {
            user_voice: request.user_voice,
            assistant_voice: request.assistant_voice,
        };
        debug!(recording = %request.recording_id, "requesting audio generation");

        let response = self
            .client
            .post(self.audio_url(&request.recording_id))
            .json(&body)
            .send()
            .await
            .context("audio generation request failed")?;

        Self::decode(response).await
    }

    async fn query_status(&self, recording_id: &RecordingId) -> Result<StatusReport> {
        let response = self
            .client
            .get(format!("{}/status", self.audio_url(recording_id)))
            .send()
            .await
            .context("audio status request failed")?;

        Self::decode(response).await
    }
}
