//! Basic example of using roadwatch-eye

use roadwatch_eye::{
    DetectionConfig, DetectionRunner, DetectionService, FrameProcessingConfig, FrameScheduler,
    SimulatedBackend, SyntheticFrameSource,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // tracing_subscriber::fmt::init();

    let detection_config = DetectionConfig {
        confidence_threshold: 0.7,
        nms_threshold: 0.4,
        max_detections: 8,
        model_input_size: 640,
    };

    let backend = SimulatedBackend::new(7)
        .with_detection_config(detection_config.clone())
        .with_load_latency(Duration::from_millis(200))
        .with_inference_latency(Duration::from_millis(30));

    let service = Arc::new(DetectionService::new(Box::new(backend)).with_config(detection_config)?);
    if !service.initialize().await {
        return Err("Detection service failed to initialize".into());
    }

    let frames_config = FrameProcessingConfig {
        target_fps: 10.0,
        skip_frames: 0,
        max_concurrent: 2,
        image_quality: 0.7,
    };
    let scheduler = Arc::new(FrameScheduler::new(service, frames_config)?);
    let runner = DetectionRunner::new(scheduler.clone());
    let mut updates = runner.subscribe();

    runner.start(Box::new(SyntheticFrameSource::with_size(1920, 1080)))?;
    println!("Detection started! Press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = updates.borrow_and_update().clone();
                for detection in &update.detections {
                    let b = detection.bounding_box;
                    println!(
                        "{:>5} {:.2} at ({:.0}, {:.0}) {:.0}x{:.0}",
                        detection.class, detection.confidence, b.x, b.y, b.width, b.height
                    );
                }
                println!("-- {} FPS", update.stats.current_fps);
            }
        }
    }

    runner.dispose();
    println!("Detection stopped: {:?}", scheduler.stats());
    Ok(())
}
