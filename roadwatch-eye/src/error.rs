//! Error types for roadwatch-eye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// `detect` was called before a successful `initialize`, or after `dispose`.
    #[error("Detection service not initialized")]
    NotInitialized,

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Camera error: {0}")]
    Camera(String),

    /// `start` was called on a runner whose loop is still active.
    #[error("Detection runner already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisionError {
    /// Whether the error is a caller bug that must be surfaced rather than degraded.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VisionError::NotInitialized)
    }
}
