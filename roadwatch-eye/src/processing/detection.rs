//! Detection service: backend lifecycle plus post-processing

use crate::config::{DetectionConfig, DetectionConfigUpdate};
use crate::error::VisionError;
use crate::models::DetectionBackend;
use crate::processing::postprocess::PostProcessor;
use crate::types::{Detection, Frame};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Owns a [`DetectionBackend`] and turns its raw candidates into final detections
pub struct DetectionService {
    backend: Box<dyn DetectionBackend>,
    config: RwLock<DetectionConfig>,
    ready: RwLock<bool>,
    model_path: Option<PathBuf>,
}

impl DetectionService {
    /// Create a service with the default [`DetectionConfig`]
    pub fn new(backend: Box<dyn DetectionBackend>) -> Self {
        Self {
            backend,
            config: RwLock::new(DetectionConfig::default()),
            ready: RwLock::new(false),
            model_path: None,
        }
    }

    pub fn with_config(mut self, config: DetectionConfig) -> Result<Self, VisionError> {
        config.validate().map_err(VisionError::Config)?;
        self.config = RwLock::new(config);
        Ok(self)
    }

    /// Model artifact handed to the backend on `initialize`
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Load the backend. Returns false, leaving the service not ready, if loading fails.
    pub async fn initialize(&self) -> bool {
        info!("Initializing detection service ({})", self.backend.name());

        // Push the service config down before the first load
        let snapshot = self.config();
        self.backend.update_config(&DetectionConfigUpdate {
            confidence_threshold: Some(snapshot.confidence_threshold),
            nms_threshold: Some(snapshot.nms_threshold),
            max_detections: Some(snapshot.max_detections),
            model_input_size: Some(snapshot.model_input_size),
        });

        match self.backend.load(self.model_path.as_deref()).await {
            Ok(true) => {
                *self.ready.write() = true;
                info!("Detection service ready");
                true
            }
            Ok(false) => {
                error!("Detection backend {} did not become ready", self.backend.name());
                false
            }
            Err(e) => {
                error!("Failed to initialize detection service: {}", e);
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.read()
    }

    /// Run the backend on `frame` and post-process its candidates.
    ///
    /// Fails only with [`VisionError::NotInitialized`]; backend errors are logged
    /// and yield an empty list.
    pub async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        if !self.is_ready() {
            return Err(VisionError::NotInitialized);
        }

        // Changes made while this call is in flight apply to the next one
        let config = self.config();

        match self.backend.infer(frame).await {
            Ok(candidates) => {
                let raw = candidates.len();
                let detections = PostProcessor::process_with(candidates, &config);
                debug!(
                    "Frame {}: {} candidates, {} detections",
                    frame.uri,
                    raw,
                    detections.len()
                );
                Ok(detections)
            }
            Err(e) => {
                warn!("Detection failed for frame {}: {}", frame.uri, e);
                Ok(Vec::new())
            }
        }
    }

    /// Merge `update` into the service config and forward it to the backend
    pub fn update_config(&self, update: &DetectionConfigUpdate) -> Result<(), VisionError> {
        {
            let mut config = self.config.write();
            let next = config.merged(update)?;
            *config = next;
        }
        self.backend.update_config(update);
        debug!("Detection config updated: {:?}", update);
        Ok(())
    }

    pub fn config(&self) -> DetectionConfig {
        self.config.read().clone()
    }

    /// Release the backend. Later `detect` calls fail with `NotInitialized`.
    pub fn dispose(&self) {
        *self.ready.write() = false;
        self.backend.dispose();
        info!("Detection service disposed");
    }
}
