//! Configuration files, model assets and serialized output

use roadwatch_eye::config::{ModelConfig, PipelineConfig};
use roadwatch_eye::error::VisionError;
use roadwatch_eye::models::{DetectionBackend, ModelAssets, SimulatedBackend};
use roadwatch_eye::processing::DetectionService;
use roadwatch_eye::runner::DetectionUpdate;
use roadwatch_eye::types::{BoundingBox, Detection, ProcessingStats, RawCandidate, VehicleClass};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_pipeline_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("roadwatch.toml");
    fs::write(
        &path,
        r#"
[detection]
confidence_threshold = 0.6
max_detections = 4

[frames]
target_fps = 5.0
skip_frames = 0
max_concurrent = 1

[model]
model_dir = "/srv/models"
model_file = "yolov5s.tflite"
seed = 7
load_latency_ms = 0
inference_latency_ms = 0
"#,
    )
    .unwrap();

    let config = PipelineConfig::from_file(&path).unwrap();
    assert_eq!(config.detection.confidence_threshold, 0.6);
    assert_eq!(config.detection.max_detections, 4);
    assert_eq!(config.detection.nms_threshold, 0.4);
    assert_eq!(config.frames.target_fps, 5.0);
    assert_eq!(config.frames.max_concurrent, 1);
    assert_eq!(config.frames.image_quality, 0.7);
    assert_eq!(config.model.seed, 7);
    assert_eq!(
        config.model.model_path().unwrap(),
        std::path::PathBuf::from("/srv/models/yolov5s.tflite")
    );
}

#[test]
fn test_pipeline_config_errors() {
    let temp_dir = TempDir::new().unwrap();

    let missing = PipelineConfig::from_file(&temp_dir.path().join("absent.toml"));
    assert!(matches!(missing, Err(VisionError::Io(_))));

    let broken = temp_dir.path().join("broken.toml");
    fs::write(&broken, "[detection\nconfidence_threshold = ").unwrap();
    assert!(matches!(
        PipelineConfig::from_file(&broken),
        Err(VisionError::Toml(_))
    ));

    let invalid = temp_dir.path().join("invalid.toml");
    fs::write(&invalid, "[detection]\nnms_threshold = 1.5\n").unwrap();
    assert!(matches!(
        PipelineConfig::from_file(&invalid),
        Err(VisionError::Config(_))
    ));

    let glacial = temp_dir.path().join("glacial.toml");
    fs::write(&glacial, "[frames]\ntarget_fps = 1e-20\n").unwrap();
    assert!(matches!(
        PipelineConfig::from_file(&glacial),
        Err(VisionError::Config(_))
    ));
}

#[test]
fn test_default_model_dir() {
    let config = ModelConfig::default();
    assert!(
        config.model_dir.ends_with(".roadwatch/models")
            || config.model_dir.ends_with("assets/models")
    );
}

#[test]
fn test_model_assets_report() {
    let temp_dir = TempDir::new().unwrap();
    let assets = ModelAssets::new(temp_dir.path().join("models"));
    assets.ensure_model_dir().unwrap();

    let report = assets.check().unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.missing().count(), 2);

    let weights = vec![0u8; 3 * 1024 * 1024];
    fs::write(temp_dir.path().join("models/yolov5s.mlmodel"), weights).unwrap();
    let report = assets.check().unwrap();
    let present: Vec<_> = report.present().collect();
    assert_eq!(present.len(), 1);
    assert_eq!(present[0].name, "yolov5s.mlmodel");
    assert!((present[0].size_mb().unwrap() - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_simulated_backend_with_present_asset() {
    let temp_dir = TempDir::new().unwrap();
    let model_path = temp_dir.path().join("yolov5s.mlmodel");
    fs::write(&model_path, b"weights").unwrap();

    let backend = Arc::new(SimulatedBackend::new(1));
    let service = DetectionService::new(Box::new(backend.clone())).with_model_path(&model_path);
    assert!(service.initialize().await);
    assert!(!backend.is_degraded());
    assert_eq!(backend.name(), "simulated");
    assert_eq!(service.model_path(), Some(model_path.as_path()));
}

#[tokio::test]
async fn test_missing_asset_is_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(SimulatedBackend::new(1));
    let service = DetectionService::new(Box::new(backend.clone()))
        .with_model_path(temp_dir.path().join("yolov5s.mlmodel"));
    assert!(service.initialize().await);
    assert!(backend.is_degraded());
}

#[test]
fn test_detection_update_json() {
    let detection = Detection::from(RawCandidate::new(
        VehicleClass::Truck,
        0.8,
        BoundingBox::new(1.0, 2.0, 3.0, 4.0),
    ));
    let update = DetectionUpdate {
        detections: vec![detection.clone()],
        stats: ProcessingStats {
            frames_processed: 3,
            ..Default::default()
        },
        frame_timestamp: None,
    };

    let value = serde_json::to_value(&update).unwrap();
    assert_eq!(value["detections"][0]["class"], "truck");
    assert_eq!(value["stats"]["frames_processed"], 3);

    let restored: DetectionUpdate = serde_json::from_value(value).unwrap();
    assert_eq!(restored.detections[0].id, detection.id);
}
