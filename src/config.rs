// Configuration file support for the emotion detector
//
// Settings come from a TOML file; a missing file means defaults.
// Classifier thresholds are fixed and are not configurable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{EmotionDetectorError, Result};
use crate::gate::{GateConfig, DEFAULT_EXTRACTOR_TIMEOUT};
use crate::models::RawFaceObservation;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "emotion-detector.toml";

/// Largest accepted frame width or height in pixels
pub const MAX_FRAME_DIMENSION: u32 = 8192;

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub gate: GateSection,
    pub source: SourceConfig,
    pub replay: ReplayConfig,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file; logs never go to the console.
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("emotion_detector.log"),
        }
    }
}

/// Admission gate settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSection {
    /// Extractor time budget in milliseconds, 0 disables it.
    pub extractor_timeout_ms: u64,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            extractor_timeout_ms: DEFAULT_EXTRACTOR_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Synthetic frame source settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub fps: u32,
    /// Number of frames to emit before stopping.
    pub frames: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            frames: 90,
            width: 64,
            height: 48,
        }
    }
}

/// Scripted extractor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Simulated extractor latency in milliseconds.
    pub latency_ms: u64,
    /// Per-frame scripts, cycled in order.
    pub frames: Vec<ReplayFrame>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            latency_ms: 80,
            frames: default_script(),
        }
    }
}

/// Faces the scripted extractor reports for one frame. Empty means no face.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplayFrame {
    pub faces: Vec<RawFaceObservation>,
}

fn default_script() -> Vec<ReplayFrame> {
    let face = |smile, left, right| ReplayFrame {
        faces: vec![RawFaceObservation::new(Some(smile), Some(left), Some(right))],
    };
    vec![
        face(0.8, 0.9, 0.9),
        face(0.3, 0.9, 0.9),
        face(0.1, 0.1, 0.1),
        face(0.3, 0.1, 0.1),
        ReplayFrame::default(),
    ]
}

impl AppConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config not found: {}, using defaults", path.display());
            return Ok(Self::default());
        }

        info!("Loading config: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<()> {
        if self.source.fps == 0 {
            return Err(EmotionDetectorError::Config(
                "source.fps must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [("width", self.source.width), ("height", self.source.height)] {
            if !(1..=MAX_FRAME_DIMENSION).contains(&value) {
                return Err(EmotionDetectorError::Config(format!(
                    "source.{name} must be 1-{MAX_FRAME_DIMENSION}, got {value}"
                )));
            }
        }

        for (index, frame) in self.replay.frames.iter().enumerate() {
            for face in &frame.faces {
                let fields = [
                    ("smile", face.smile),
                    ("left_eye_open", face.left_eye_open),
                    ("right_eye_open", face.right_eye_open),
                ];
                for (name, value) in fields {
                    if let Some(p) = value {
                        if !(0.0..=1.0).contains(&p) {
                            return Err(EmotionDetectorError::Config(format!(
                                "replay.frames[{index}].{name} must be 0.0-1.0, got {p}"
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Gate settings derived from the `[gate]` section.
    pub fn gate_config(&self) -> GateConfig {
        let timeout = match self.gate.extractor_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        GateConfig {
            extractor_timeout: timeout,
        }
    }
}
