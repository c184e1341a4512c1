//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// External media engine settings.
    pub engine: EngineConfig,

    /// Compression knobs for the size-constrained encode loop.
    pub encoding: EncodingDefaults,

    /// Template composition defaults.
    pub composition: CompositionDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Additional platform profiles registered after the built-in table.
    pub extra_profiles: Vec<ProfileConfig>,
}

/// How to reach the external engine binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Encoder binary (name on PATH or absolute path).
    pub ffmpeg_path: PathBuf,

    /// Probe binary (name on PATH or absolute path).
    pub ffprobe_path: PathBuf,

    /// Fraction of available cores handed to the engine as its thread hint.
    pub thread_fraction: f64,
}

/// CRF escalation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingDefaults {
    /// Starting (best quality) CRF.
    pub min_crf: u32,

    /// Highest CRF the loop may escalate to.
    pub max_crf: u32,

    /// CRF increment per rejected attempt.
    pub crf_step: u32,

    /// Attempt budget per size-constrained encode.
    pub max_attempts: u32,

    /// Fallback video bitrate when a profile bitrate cannot be parsed.
    pub default_video_bitrate: String,
}

/// Canonical template geometry and size ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionDefaults {
    pub canonical_width: u32,
    pub canonical_height: u32,

    /// Per-cell ceilings (bytes).
    pub single_cell_max_bytes: u64,
    pub grid_cell_max_bytes: u64,
    pub row_cell_max_bytes: u64,

    /// Absolute ceiling for the composed artifact (bytes).
    pub max_total_bytes: u64,

    pub overlay_font_size: u32,
    pub overlay_portrait_font_size: u32,
    pub overlay_margin: u32,

    pub outro_duration_secs: f64,
    pub outro_fade_in_secs: f64,
}

/// A platform profile declared in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    pub max_width: u32,
    pub max_height: u32,
    pub max_duration_secs: u32,
    pub max_file_size: u64,
    pub video_codec: String,
    pub audio_codec: String,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub output_format: String,
    #[serde(default)]
    pub force_portrait: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipgrid=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            thread_fraction: 0.75,
        }
    }
}

impl Default for EncodingDefaults {
    fn default() -> Self {
        Self {
            min_crf: 18,
            max_crf: 28,
            crf_step: 5,
            max_attempts: 3,
            default_video_bitrate: "2M".to_string(),
        }
    }
}

impl Default for CompositionDefaults {
    fn default() -> Self {
        Self {
            canonical_width: 1280,
            canonical_height: 720,
            single_cell_max_bytes: 30 * 1024 * 1024,
            grid_cell_max_bytes: 8 * 1024 * 1024,
            row_cell_max_bytes: 10 * 1024 * 1024,
            max_total_bytes: 50 * 1024 * 1024,
            overlay_font_size: 36,
            overlay_portrait_font_size: 28,
            overlay_margin: 20,
            outro_duration_secs: 3.0,
            outro_fade_in_secs: 0.5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        let (config, warning) = Self::read_or_default(config_path);
        if let Some(warning) = warning {
            tracing::warn!("{warning}");
        }
        config
    }

    /// Read config from `config_path`, falling back to defaults.
    ///
    /// Returns the fallback reason instead of logging it, for callers that
    /// load config before a subscriber is installed.
    pub fn read_or_default(config_path: &Path) -> (Self, Option<String>) {
        if !config_path.exists() {
            return (Self::default(), None);
        }
        let warning = match std::fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return (config, None),
                Err(e) => format!("Failed to parse config at {:?}: {}", config_path, e),
            },
            Err(e) => format!("Failed to read config at {:?}: {}", config_path, e),
        };
        (Self::default(), Some(warning))
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipgrid").join("config.json")
}
