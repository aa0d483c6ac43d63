//! Configuration for the strata pipeline.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $STRATA_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/strata/config.toml
//!   3. ~/.config/strata/config.toml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::ChunkConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub chunks: ChunkConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames the sender emits.
    pub packets: u32,
    /// Payload bytes per frame.
    pub payload_length: u32,
    /// Receivers every frame is delivered to.
    pub receivers: u32,
    /// Fill bytes appended after the payload. 0 = none.
    pub padding: u32,
    /// Flip one byte in every Nth frame sent to receiver 0. 0 = never.
    pub corrupt_every: u32,
    /// Capacity of each channel between stages.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            packets: 16,
            payload_length: 64,
            receivers: 3,
            padding: 0,
            corrupt_every: 0,
            channel_capacity: 32,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("strata")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl StrataConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse `path`, or fall back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("STRATA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text =
            toml::to_string_pretty(&StrataConfig::default()).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply STRATA_* overrides looked up through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let flag = |key: &str| var(key).map(|v| v == "true" || v == "1");
        let number = |key: &str| var(key).and_then(|v| v.parse::<u32>().ok());

        if let Some(v) = flag("STRATA_CHUNKS__IMPLICIT_SERIALIZATION") {
            self.chunks.implicit_serialization = v;
        }
        if let Some(v) = flag("STRATA_CHUNKS__FLATTEN") {
            self.chunks.flatten = v;
        }
        if let Some(v) = number("STRATA_PIPELINE__PACKETS") {
            self.pipeline.packets = v;
        }
        if let Some(v) = number("STRATA_PIPELINE__PAYLOAD_LENGTH") {
            self.pipeline.payload_length = v;
        }
        if let Some(v) = number("STRATA_PIPELINE__RECEIVERS") {
            self.pipeline.receivers = v;
        }
        if let Some(v) = number("STRATA_PIPELINE__PADDING") {
            self.pipeline.padding = v;
        }
        if let Some(v) = number("STRATA_PIPELINE__CORRUPT_EVERY") {
            self.pipeline.corrupt_every = v;
        }
    }
}
