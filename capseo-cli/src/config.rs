//! Configuration for the `capseo` tool.

use std::path::{Path, PathBuf};

use capseo_core::{CodecConfig, StreamOptions};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Encoder parameters used by `synth`.
    pub codec: CodecConfig,
    /// Synthetic stream settings.
    pub synth: SynthConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Synthetic colour-sweep stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Number of frames to encode.
    pub frames: u32,
    /// Output stream path.
    pub output: PathBuf,
    /// Write a revision 2 stream with per-record checksums.
    pub checksum: bool,
    /// Take frame IDs from the wall clock instead of spacing them at the
    /// configured fps.
    pub realtime: bool,
    /// Send a new cursor bitmap every N frames (0 = no cursor).
    pub cursor_every: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            frames: 1000,
            output: PathBuf::from("example.cps"),
            checksum: false,
            realtime: false,
            cursor_every: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            checksum: self.synth.checksum,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
