use proptest::prelude::*;
use roadwatch_eye::clock::ManualClock;
use roadwatch_eye::config::{DetectionConfig, FrameProcessingConfig};
use roadwatch_eye::coordinates::{resize_for_model, to_model_space, to_screen_space};
use roadwatch_eye::models::ScriptedBackend;
use roadwatch_eye::processing::{
    DetectionService, FrameOutcome, FrameScheduler, PostProcessor, RateLimiter,
};
use roadwatch_eye::types::{BoundingBox, Dimensions, Frame, RawCandidate, VehicleClass};
use std::sync::Arc;
use std::time::Duration;

fn class_strategy() -> impl Strategy<Value = VehicleClass> {
    prop_oneof![
        Just(VehicleClass::Car),
        Just(VehicleClass::Truck),
        Just(VehicleClass::Bus),
    ]
}

fn box_strategy() -> impl Strategy<Value = BoundingBox> {
    (0.0f32..600.0, 0.0f32..600.0, 1.0f32..200.0, 1.0f32..200.0)
        .prop_map(|(x, y, w, h)| BoundingBox::new(x, y, w, h))
}

fn candidate_strategy() -> impl Strategy<Value = RawCandidate> {
    (class_strategy(), 0.0f32..=1.0, box_strategy()).prop_map(|(class, confidence, bounding_box)| {
        RawCandidate::new(class, confidence, bounding_box)
    })
}

proptest! {
    #[test]
    fn test_postprocess_invariants(
        candidates in prop::collection::vec(candidate_strategy(), 0..40),
        confidence_threshold in 0.0f32..=1.0,
        nms_threshold in 0.0f32..=1.0,
        max_detections in 0usize..12,
    ) {
        let total = candidates.len();
        let detections =
            PostProcessor::process(candidates, confidence_threshold, nms_threshold, max_detections);

        prop_assert!(detections.len() <= max_detections);
        prop_assert!(detections.len() <= total);
        for d in &detections {
            prop_assert!(d.confidence >= confidence_threshold);
        }
        for (i, a) in detections.iter().enumerate() {
            for b in detections.iter().skip(i + 1) {
                prop_assert!(a.bounding_box.iou(&b.bounding_box) <= nms_threshold);
            }
        }
        // Sorted by descending confidence
        for pair in detections.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_detect_output_invariants(candidates in prop::collection::vec(candidate_strategy(), 0..30)) {
        let config = DetectionConfig::default();
        let detections = tokio_test::block_on(async {
            let backend = ScriptedBackend::new().with_frame(candidates);
            let service = DetectionService::new(Box::new(backend));
            assert!(service.initialize().await);
            service.detect(&Frame::new("mock://frame_0", 640, 640)).await.unwrap()
        });

        prop_assert!(detections.len() <= config.max_detections);
        for (i, a) in detections.iter().enumerate() {
            prop_assert!(a.confidence >= config.confidence_threshold);
            for b in &detections[i + 1..] {
                prop_assert!(a.bounding_box.iou(&b.bounding_box) <= config.nms_threshold);
            }
        }
    }

    #[test]
    fn test_iou_bounds(a in box_strategy(), b in box_strategy()) {
        let iou = a.iou(&b);
        prop_assert!((0.0..=1.0).contains(&iou));
        prop_assert!((iou - b.iou(&a)).abs() < 1e-6);
        prop_assert!((a.iou(&a) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_resize_preserves_orientation(width in 1u32..8000, height in 1u32..8000, target in 1u32..2048) {
        let resized = resize_for_model(Dimensions::new(width, height), target);
        if width >= height {
            prop_assert_eq!(resized.width, target);
            prop_assert!(resized.height <= target);
        } else {
            prop_assert_eq!(resized.height, target);
            prop_assert!(resized.width <= target);
        }
    }

    #[test]
    fn test_coordinate_mapping_inverse(rect in box_strategy(), width in 1u32..4000, height in 1u32..4000) {
        let screen = Dimensions::new(width, height);
        let model = resize_for_model(screen, 640);
        prop_assume!(!model.is_empty());
        let back = to_screen_space(to_model_space(rect, screen, model), screen, model);
        prop_assert!((back.x - rect.x).abs() < 1e-2);
        prop_assert!((back.y - rect.y).abs() < 1e-2);
        prop_assert!((back.width - rect.width).abs() < 1e-2);
        prop_assert!((back.height - rect.height).abs() < 1e-2);
    }

    #[test]
    fn test_rate_limiter_one_per_interval(
        steps in prop::collection::vec(0u64..250, 1..200),
        target_fps in 1.0f64..60.0,
    ) {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(target_fps, Arc::new(clock.clone()));
        let interval = limiter.interval();

        let mut admitted: Vec<Duration> = Vec::new();
        let mut now = Duration::ZERO;
        for step in steps {
            now += Duration::from_millis(step);
            clock.set(now);
            if limiter.should_admit() {
                admitted.push(now);
            }
        }

        prop_assert!(!admitted.is_empty());
        for pair in admitted.windows(2) {
            prop_assert!(pair[1] - pair[0] >= interval);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_scheduler_never_exceeds_max_concurrent(
        latencies in prop::collection::vec(0u64..4, 1..16),
        max_concurrent in 1usize..4,
        frame_count in 1usize..24,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let (peak, outcomes) = runtime.block_on(async move {
            let backend = Arc::new(
                ScriptedBackend::new()
                    .with_infer_latencies(latencies.into_iter().map(Duration::from_millis).collect()),
            );
            let service = Arc::new(DetectionService::new(Box::new(backend.clone())));
            assert!(service.initialize().await);

            let clock = ManualClock::new();
            let config = FrameProcessingConfig {
                target_fps: 10.0,
                skip_frames: 0,
                max_concurrent,
                image_quality: 0.7,
            };
            let scheduler = Arc::new(
                FrameScheduler::with_clock(service, config, Arc::new(clock.clone())).unwrap(),
            );

            let mut handles = Vec::new();
            for n in 0..frame_count {
                clock.advance(Duration::from_secs(1));
                let scheduler = scheduler.clone();
                handles.push(tokio::spawn(async move {
                    let frame = Frame::new(format!("mock://frame_{}", n), 640, 640);
                    scheduler.process_frame(&frame).await
                }));
                if n % 3 == 0 {
                    tokio::task::yield_now().await;
                }
            }

            let mut outcomes = Vec::new();
            for handle in handles {
                outcomes.push(handle.await.unwrap().unwrap());
            }
            assert!(scheduler.is_idle());

            let stats = scheduler.stats();
            let processed = outcomes.iter().filter(|o| o.is_processed()).count() as u64;
            assert_eq!(stats.frames_processed, processed);
            assert_eq!(
                stats.frames_processed + stats.dropped_frames + stats.rate_limited_frames,
                frame_count as u64
            );

            (backend.peak_concurrency(), outcomes)
        });

        prop_assert!(peak <= max_concurrent);
        prop_assert!(outcomes.iter().any(FrameOutcome::is_processed));
    }
}
