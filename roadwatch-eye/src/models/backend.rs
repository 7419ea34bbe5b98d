//! Detection backend contract and model lifecycle

use crate::config::DetectionConfigUpdate;
use crate::error::VisionError;
use crate::types::{Frame, RawCandidate};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Model lifecycle: `Unloaded -> Loading -> Ready -> Disposed`.
/// A failed load returns to `Unloaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendState {
    Unloaded,
    Loading,
    Ready,
    Disposed,
}

/// Inference engine producing raw candidates for a frame.
///
/// Implementations must only return candidates with confidence in `[0, 1]` and a box
/// at least partly inside `[0, frame.width] x [0, frame.height]`.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    fn state(&self) -> BackendState;

    /// Load the model. Returns `Ok(true)` without reloading when already `Ready`.
    async fn load(&self, model_path: Option<&Path>) -> Result<bool, VisionError>;

    /// Produce raw candidates for `frame`. Fails unless `Ready`.
    async fn infer(&self, frame: &Frame) -> Result<Vec<RawCandidate>, VisionError>;

    /// Merge config fields that affect future `infer` calls
    fn update_config(&self, update: &DetectionConfigUpdate);

    /// Release the model. `infer` fails afterwards.
    fn dispose(&self);
}

#[async_trait]
impl<T: DetectionBackend + ?Sized> DetectionBackend for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn state(&self) -> BackendState {
        (**self).state()
    }

    async fn load(&self, model_path: Option<&Path>) -> Result<bool, VisionError> {
        (**self).load(model_path).await
    }

    async fn infer(&self, frame: &Frame) -> Result<Vec<RawCandidate>, VisionError> {
        (**self).infer(frame).await
    }

    fn update_config(&self, update: &DetectionConfigUpdate) {
        (**self).update_config(update)
    }

    fn dispose(&self) {
        (**self).dispose()
    }
}

/// State machine shared by the bundled backends
#[derive(Debug)]
pub struct Lifecycle {
    state: RwLock<BackendState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BackendState::Unloaded),
        }
    }

    pub fn state(&self) -> BackendState {
        *self.state.read()
    }

    /// Enter `Loading`. Returns `Ok(true)` when the model is already `Ready`.
    pub fn begin_load(&self) -> Result<bool, VisionError> {
        let mut state = self.state.write();
        match *state {
            BackendState::Ready => Ok(true),
            BackendState::Disposed => Err(VisionError::ModelLoad(
                "Backend has been disposed".to_string(),
            )),
            BackendState::Unloaded | BackendState::Loading => {
                *state = BackendState::Loading;
                Ok(false)
            }
        }
    }

    /// Leave `Loading`: `Ready` on success, back to `Unloaded` on failure.
    /// A dispose that raced the load wins.
    pub fn finish_load(&self, success: bool) -> BackendState {
        let mut state = self.state.write();
        if *state != BackendState::Disposed {
            *state = if success {
                BackendState::Ready
            } else {
                BackendState::Unloaded
            };
        }
        *state
    }

    pub fn ensure_ready(&self) -> Result<(), VisionError> {
        match self.state() {
            BackendState::Ready => Ok(()),
            other => Err(VisionError::Inference(format!(
                "Model not ready (state: {:?})",
                other
            ))),
        }
    }

    pub fn dispose(&self) {
        *self.state.write() = BackendState::Disposed;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), BackendState::Unloaded);
        assert!(lifecycle.ensure_ready().is_err());

        assert!(!lifecycle.begin_load().unwrap());
        assert_eq!(lifecycle.state(), BackendState::Loading);
        assert_eq!(lifecycle.finish_load(true), BackendState::Ready);
        assert!(lifecycle.ensure_ready().is_ok());

        // Idempotent once ready
        assert!(lifecycle.begin_load().unwrap());
        assert_eq!(lifecycle.state(), BackendState::Ready);
    }

    #[test]
    fn test_lifecycle_failed_load_returns_to_unloaded() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_load().unwrap();
        assert_eq!(lifecycle.finish_load(false), BackendState::Unloaded);
    }

    #[test]
    fn test_lifecycle_dispose_is_terminal() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_load().unwrap();
        lifecycle.finish_load(true);
        lifecycle.dispose();
        assert!(lifecycle.ensure_ready().is_err());
        assert!(matches!(lifecycle.begin_load(), Err(VisionError::ModelLoad(_))));
    }

    #[test]
    fn test_dispose_during_load_wins() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin_load().unwrap();
        lifecycle.dispose();
        assert_eq!(lifecycle.finish_load(true), BackendState::Disposed);
    }
}
