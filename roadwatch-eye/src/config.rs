//! Configuration for roadwatch-eye

use crate::error::VisionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Post-processing and model parameters used by the detection service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum confidence a detection needs to be reported
    pub confidence_threshold: f32,
    /// IoU above which a lower-confidence box is suppressed
    pub nms_threshold: f32,
    /// Upper bound on detections returned per frame
    pub max_detections: usize,
    /// Square model input edge in pixels
    pub model_input_size: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            nms_threshold: 0.4,
            max_detections: 8,
            model_input_size: 640,
        }
    }
}

impl DetectionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be between 0 and 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err("NMS threshold must be between 0 and 1".to_string());
        }

        if self.model_input_size == 0 {
            return Err("Model input size must be non-zero".to_string());
        }

        if self.model_input_size > 4096 {
            return Err("Model input size too large (max 4096)".to_string());
        }

        Ok(())
    }

    /// Overwrite every field present in `update`
    pub fn apply(&mut self, update: &DetectionConfigUpdate) {
        if let Some(v) = update.confidence_threshold {
            self.confidence_threshold = v;
        }
        if let Some(v) = update.nms_threshold {
            self.nms_threshold = v;
        }
        if let Some(v) = update.max_detections {
            self.max_detections = v;
        }
        if let Some(v) = update.model_input_size {
            self.model_input_size = v;
        }
    }

    /// Copy with `update` applied, rejected if the result does not validate
    pub fn merged(&self, update: &DetectionConfigUpdate) -> Result<Self, VisionError> {
        let mut next = self.clone();
        next.apply(update);
        next.validate().map_err(VisionError::Config)?;
        Ok(next)
    }
}

/// Partial update for [`DetectionConfig`]; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfigUpdate {
    pub confidence_threshold: Option<f32>,
    pub nms_threshold: Option<f32>,
    pub max_detections: Option<usize>,
    pub model_input_size: Option<u32>,
}

/// Admission parameters used by the frame scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameProcessingConfig {
    /// Admission rate ceiling (frames per second)
    pub target_fps: f64,
    /// Frames discarded between two admissions
    pub skip_frames: u32,
    /// Maximum detections in flight at once
    pub max_concurrent: usize,
    /// Capture quality hint for the frame source, in (0, 1]
    pub image_quality: f32,
}

impl Default for FrameProcessingConfig {
    fn default() -> Self {
        Self {
            target_fps: 10.0,
            skip_frames: 2,
            max_concurrent: 2,
            image_quality: 0.7,
        }
    }
}

impl FrameProcessingConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err("Target FPS must be greater than 0".to_string());
        }

        if Duration::try_from_secs_f64(1.0 / self.target_fps).is_err() {
            return Err("Target FPS too small, frame interval out of range".to_string());
        }

        if self.max_concurrent == 0 {
            return Err("Max concurrent must be at least 1".to_string());
        }

        if !(self.image_quality > 0.0 && self.image_quality <= 1.0) {
            return Err("Image quality must be in (0, 1]".to_string());
        }

        Ok(())
    }

    /// Minimum spacing between two admitted frames; saturates for rates that do not validate
    pub fn frame_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.target_fps).unwrap_or(Duration::MAX)
    }

    /// Overwrite every field present in `update`
    pub fn apply(&mut self, update: &FrameProcessingConfigUpdate) {
        if let Some(v) = update.target_fps {
            self.target_fps = v;
        }
        if let Some(v) = update.skip_frames {
            self.skip_frames = v;
        }
        if let Some(v) = update.max_concurrent {
            self.max_concurrent = v;
        }
        if let Some(v) = update.image_quality {
            self.image_quality = v;
        }
    }

    /// Copy with `update` applied, rejected if the result does not validate
    pub fn merged(&self, update: &FrameProcessingConfigUpdate) -> Result<Self, VisionError> {
        let mut next = self.clone();
        next.apply(update);
        next.validate().map_err(VisionError::Config)?;
        Ok(next)
    }
}

/// Partial update for [`FrameProcessingConfig`]; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameProcessingConfigUpdate {
    pub target_fps: Option<f64>,
    pub skip_frames: Option<u32>,
    pub max_concurrent: Option<usize>,
    pub image_quality: Option<f32>,
}

/// Backend selection and model asset locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding the model artifacts
    pub model_dir: PathBuf,
    /// Artifact passed to `load`; relative paths resolve against `model_dir`
    pub model_file: Option<PathBuf>,
    /// Seed for the simulated backend
    pub seed: u64,
    pub load_latency_ms: u64,
    pub inference_latency_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let model_dir = dirs::home_dir()
            .map(|mut p| {
                p.push(".roadwatch");
                p.push("models");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./assets/models"));

        Self {
            model_dir,
            model_file: Some(PathBuf::from("yolov5s.mlmodel")),
            seed: 42,
            load_latency_ms: 1500,
            inference_latency_ms: 30,
        }
    }
}

impl ModelConfig {
    /// Resolved path of the model artifact, if one is configured
    pub fn model_path(&self) -> Option<PathBuf> {
        self.model_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                self.model_dir.join(file)
            }
        })
    }

    pub fn load_latency(&self) -> Duration {
        Duration::from_millis(self.load_latency_ms)
    }

    pub fn inference_latency(&self) -> Duration {
        Duration::from_millis(self.inference_latency_ms)
    }
}

/// Complete pipeline configuration, loadable from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionConfig,
    pub frames: FrameProcessingConfig,
    pub model: ModelConfig,
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.detection.validate()?;
        self.frames.validate()?;
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, VisionError> {
        let config: PipelineConfig = toml::from_str(raw)?;
        config.validate().map_err(VisionError::Config)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, VisionError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
