use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::kernel::time::{AUTOSAVE_INTERVAL_MS, MAX_POLLS, POLL_INTERVAL_MS};

/// Overrides `api_base_url` when set.
pub const API_URL_ENV: &str = "DUET_AUDIO_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Network-level timeout for each API call.
    pub request_timeout_ms: u64,
    pub poll: PollConfig,
    pub playback: PlaybackConfig,
    pub preview: PreviewConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            request_timeout_ms: 30_000,
            poll: PollConfig::default(),
            playback: PlaybackConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_polls: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: POLL_INTERVAL_MS,
            max_polls: MAX_POLLS,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub autosave_interval_ms: u64,
    pub positions_path: PathBuf,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autosave_interval_ms: AUTOSAVE_INTERVAL_MS,
            positions_path: PathBuf::from("playback-positions.json"),
        }
    }
}

impl PlaybackConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Voice samples live at `<samples_base_url>/<voice>.mp3`.
    pub samples_base_url: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            samples_base_url: "/voices".to_string(),
        }
    }
}

impl ClientConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        let config: ClientConfig =
            serde_json::from_str(&raw).context("failed parsing config json")?;
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing() {
        let tmp = std::env::temp_dir().join("duet-audio-config-missing.json");
        let _ = std::fs::remove_file(&tmp);
        let config = ClientConfig::load(&tmp).expect("load defaults");
        assert_eq!(config.poll.interval_ms, 2_000);
        assert_eq!(config.poll.max_polls, 60);
        assert_eq!(config.playback.autosave_interval_ms, 5_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = std::env::temp_dir().join("duet-audio-config-partial.json");
        std::fs::write(&tmp, r#"{ "poll": { "max_polls": 5 } }"#).expect("write config");
        let config = ClientConfig::load(&tmp).expect("load partial");
        assert_eq!(config.poll.max_polls, 5);
        assert_eq!(config.poll.interval_ms, 2_000);
        assert_eq!(config.preview.samples_base_url, "/voices");
        let _ = std::fs::remove_file(&tmp);
    }
}
