//! Run the detection pipeline against synthetic frames and print what it sees

use anyhow::{bail, Context};
use clap::Parser;
use roadwatch_eye::camera::SyntheticFrameSource;
use roadwatch_eye::config::PipelineConfig;
use roadwatch_eye::models::SimulatedBackend;
use roadwatch_eye::processing::{DetectionService, FrameScheduler};
use roadwatch_eye::runner::DetectionRunner;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "roadwatch")]
#[command(about = "Real-time vehicle detection demo", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// How long to run, in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Override the simulated backend seed
    #[arg(long)]
    seed: Option<u64>,

    /// Synthetic frame width
    #[arg(long, default_value = "1920")]
    width: u32,

    /// Synthetic frame height
    #[arg(long, default_value = "1080")]
    height: u32,

    /// Print final statistics as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level: tracing::Level = cli
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level: {}", cli.log_level))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.model.seed = seed;
    }

    let backend = SimulatedBackend::from_config(&config.model, &config.detection);
    let mut service =
        DetectionService::new(Box::new(backend)).with_config(config.detection.clone())?;
    if let Some(path) = config.model.model_path() {
        service = service.with_model_path(path);
    }

    let service = Arc::new(service);
    if !service.initialize().await {
        bail!("Detection service failed to initialize");
    }

    let scheduler = Arc::new(FrameScheduler::new(service, config.frames.clone())?);
    let runner = DetectionRunner::new(scheduler.clone());
    let mut updates = runner.subscribe();

    runner.start(Box::new(SyntheticFrameSource::with_size(cli.width, cli.height)))?;
    info!(
        "Running for {}s at {} FPS (skip {}, max {} concurrent)",
        cli.duration, config.frames.target_fps, config.frames.skip_frames, config.frames.max_concurrent
    );

    let deadline = tokio::time::sleep(Duration::from_secs(cli.duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = updates.borrow_and_update().clone();
                let summary: Vec<String> = update
                    .detections
                    .iter()
                    .map(|d| format!("{} {:.2}", d.class, d.confidence))
                    .collect();
                info!(
                    "{} detections [{}] avg {:.1}ms, {} FPS",
                    update.detections.len(),
                    summary.join(", "),
                    update.stats.average_processing_time,
                    update.stats.current_fps
                );
            }
        }
    }

    runner.stop();
    let stats = scheduler.stats();
    if cli.json {
        println!("{}", stats.to_json()?);
    } else {
        println!("Frames processed:    {}", stats.frames_processed);
        println!("Average time:        {:.1} ms", stats.average_processing_time);
        println!("Current FPS:         {}", stats.current_fps);
        println!("Measured FPS:        {}", stats.measured_fps);
        println!("Dropped (busy):      {}", stats.dropped_frames);
        println!("Skipped:             {}", stats.skipped_frames);
        println!("Rate limited:        {}", stats.rate_limited_frames);
    }

    runner.dispose();
    Ok(())
}
