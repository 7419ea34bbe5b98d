//! Detection backends and model assets

pub mod assets;
pub mod backend;
pub mod scripted;
pub mod simulated;

pub use assets::{AssetReport, AssetStatus, ModelAssets, REQUIRED_MODELS};
pub use backend::{BackendState, DetectionBackend, Lifecycle};
pub use scripted::{ScriptStep, ScriptedBackend};
pub use simulated::SimulatedBackend;
