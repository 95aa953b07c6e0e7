use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the stored conversation whose audio is generated and played.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(pub String);

impl RecordingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The closed set of synthesis voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoicePreset {
    MaleCasual,
    MaleFormal,
    FemaleCasual,
    FemaleFormal,
}

impl VoicePreset {
    pub const ALL: [VoicePreset; 4] = [
        VoicePreset::MaleCasual,
        VoicePreset::MaleFormal,
        VoicePreset::FemaleCasual,
        VoicePreset::FemaleFormal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VoicePreset::MaleCasual => "male-casual",
            VoicePreset::MaleFormal => "male-formal",
            VoicePreset::FemaleCasual => "female-casual",
            VoicePreset::FemaleFormal => "female-formal",
        }
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown voice preset '{0}'")]
pub struct UnknownVoice(pub String);

impl FromStr for VoicePreset {
    type Err = UnknownVoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoicePreset::ALL
            .into_iter()
            .find(|voice| voice.as_str() == s.trim())
            .ok_or_else(|| UnknownVoice(s.to_string()))
    }
}

/// Immutable once submitted to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub recording_id: RecordingId,
    pub user_voice: VoicePreset,
    pub assistant_voice: VoicePreset,
}

impl GenerationRequest {
    pub fn new(
        recording_id: impl Into<String>,
        user_voice: VoicePreset,
        assistant_voice: VoicePreset,
    ) -> Self {
        Self {
            recording_id: RecordingId::new(recording_id),
            user_voice,
            assistant_voice,
        }
    }
}

/// Server-side status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Ready,
    Generating,
    Failed,
}

/// What the generation API answers, both for the initial request and for
/// every status query. Only ever produced by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: GenerationStatus,
    #[serde(default, alias = "audioUrl", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn ready(url: impl Into<String>, duration: f64) -> Self {
        Self {
            status: GenerationStatus::Ready,
            url: Some(url.into()),
            duration: Some(duration),
            error: None,
        }
    }

    pub fn generating() -> Self {
        Self {
            status: GenerationStatus::Generating,
            url: None,
            duration: None,
            error: None,
        }
    }

    pub fn failed(error: Option<&str>) -> Self {
        Self {
            status: GenerationStatus::Failed,
            url: None,
            duration: None,
            error: error.map(str::to_string),
        }
    }
}

/// Resolved audio handed to the playback surface once generation is ready.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyAudio {
    pub url: String,
    pub duration: Option<f64>,
}

/// Signals telling cached views to refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Generation status of one recording.
    GenerationStatus(RecordingId),
    /// Any listing that shows which recordings have audio.
    RecordingList,
}
