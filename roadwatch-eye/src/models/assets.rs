//! Offline check for the model artifacts expected on disk

use crate::error::VisionError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Artifact name and description
pub const REQUIRED_MODELS: &[(&str, &str)] = &[
    ("yolov5s.mlmodel", "YOLOv5s Core ML model for iOS"),
    ("yolov5s.tflite", "YOLOv5s TensorFlow Lite model for Android"),
];

#[derive(Debug, Clone, Serialize)]
pub struct AssetStatus {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    /// `None` when the file is missing
    pub size_bytes: Option<u64>,
}

impl AssetStatus {
    pub fn is_present(&self) -> bool {
        self.size_bytes.is_some()
    }

    pub fn size_mb(&self) -> Option<f64> {
        self.size_bytes.map(|b| b as f64 / (1024.0 * 1024.0))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetReport {
    pub model_dir: PathBuf,
    pub assets: Vec<AssetStatus>,
}

impl AssetReport {
    pub fn present(&self) -> impl Iterator<Item = &AssetStatus> {
        self.assets.iter().filter(|a| a.is_present())
    }

    pub fn missing(&self) -> impl Iterator<Item = &AssetStatus> {
        self.assets.iter().filter(|a| !a.is_present())
    }

    pub fn is_complete(&self) -> bool {
        self.missing().next().is_none()
    }
}

/// Looks up model artifacts in a directory
pub struct ModelAssets {
    model_dir: PathBuf,
}

impl ModelAssets {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Ensure model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        if !self.model_dir.exists() {
            fs::create_dir_all(&self.model_dir)?;
            info!("Created model directory: {:?}", self.model_dir);
        }
        Ok(self.model_dir.clone())
    }

    /// Path of `model_name` inside the model directory
    pub fn model_path(&self, model_name: &str) -> Result<PathBuf, VisionError> {
        if model_name.is_empty() || model_name.len() > 255 {
            return Err(VisionError::ModelLoad("Invalid model name".to_string()));
        }

        if model_name.contains("..") || model_name.contains('/') || model_name.contains('\\') {
            return Err(VisionError::ModelLoad(
                "Model name contains invalid characters".to_string(),
            ));
        }

        Ok(self.model_dir.join(model_name))
    }

    /// Status of every artifact in [`REQUIRED_MODELS`]
    pub fn check(&self) -> Result<AssetReport, VisionError> {
        let mut assets = Vec::with_capacity(REQUIRED_MODELS.len());
        for (name, description) in REQUIRED_MODELS {
            let path = self.model_path(name)?;
            let size_bytes = match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => Some(meta.len()),
                _ => None,
            };
            assets.push(AssetStatus {
                name: name.to_string(),
                description: description.to_string(),
                path,
                size_bytes,
            });
        }

        Ok(AssetReport {
            model_dir: self.model_dir.clone(),
            assets,
        })
    }
}
