//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Export pipeline tuning.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Encoder backend settings.
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Encoder quality preset, mapped to concrete codec settings by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Draft,
    #[default]
    Standard,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Standard => "standard",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            other => Err(format!(
                "Unknown quality preset: {other}. Use: draft, standard, high"
            )),
        }
    }
}

/// Default export parameters and pipeline limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Default output frame rate.
    pub fps: u32,

    /// Frames per encoded batch segment.
    pub batch_size: u32,

    /// Number of batch encodes allowed in flight at once.
    pub encode_concurrency: usize,

    /// Default encoder quality preset.
    pub quality: QualityPreset,

    /// Attempts per frame before a capture failure aborts the export.
    pub capture_attempts: u32,

    /// Upper bound for one seek + pixel capture (ms).
    pub capture_timeout_ms: u64,

    /// Upper bound for one batch encode (ms).
    pub encode_timeout_ms: u64,

    /// Frames between resource-reclamation hints to the render engine.
    pub reclaim_interval: u64,

    /// Parent directory for session working directories (system temp if unset).
    pub work_dir: Option<PathBuf>,
}

/// Encoder backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// ffmpeg binary to invoke.
    pub ffmpeg_path: PathBuf,

    /// Extra arguments appended to every segment encode.
    pub extra_args: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "kinetype_export=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Log the elapsed time of each export phase when it ends.
    pub phase_timings: bool,

    /// Include the module path of each event.
    pub targets: bool,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            batch_size: 150,
            encode_concurrency: 2,
            quality: QualityPreset::Standard,
            capture_attempts: 3,
            capture_timeout_ms: 10_000,
            encode_timeout_ms: 300_000,
            reclaim_interval: 50,
            work_dir: None,
        }
    }
}

impl ExportDefaults {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_millis(self.encode_timeout_ms)
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            extra_args: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            phase_timings: false,
            targets: true,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
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

    /// Where `load` and `save` look for the config file.
    pub fn path() -> PathBuf {
        config_file_path()
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("kinetype").join("config.json")
}
