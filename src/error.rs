// Error types for the Emotion Detector

use std::time::Duration;
use thiserror::Error;

/// Main error type for the Emotion Detector
#[derive(Debug, Error)]
pub enum EmotionDetectorError {
    #[error("Face extraction failed: {0}")]
    ExtractorFailure(String),

    #[error("Face extraction timed out after {0:?}")]
    ExtractorTimeout(Duration),

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Emotion Detector operations
pub type Result<T> = std::result::Result<T, EmotionDetectorError>;
