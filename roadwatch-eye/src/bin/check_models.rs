//! Report which detection model artifacts are present in the model directory

use clap::Parser;
use roadwatch_eye::config::ModelConfig;
use roadwatch_eye::models::ModelAssets;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "check_models")]
#[command(about = "Check detection model assets", long_about = None)]
struct Cli {
    /// Model directory (defaults to ~/.roadwatch/models)
    #[arg(long, short)]
    dir: Option<PathBuf>,

    /// Create the directory if it does not exist
    #[arg(long)]
    create: bool,

    /// Exit with a non-zero status when an asset is missing
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    let dir = cli.dir.unwrap_or_else(|| ModelConfig::default().model_dir);
    let assets = ModelAssets::new(dir);
    if cli.create {
        assets.ensure_model_dir()?;
    }

    let report = assets.check()?;
    println!("Model directory: {}", report.model_dir.display());

    for asset in report.present() {
        println!(
            "  [ok]      {} ({:.1} MB) - {}",
            asset.name,
            asset.size_mb().unwrap_or_default(),
            asset.description
        );
    }
    for asset in report.missing() {
        println!("  [missing] {} - {}", asset.name, asset.description);
    }

    if report.is_complete() {
        println!("All model assets present");
    } else {
        println!("Detection will fall back to simulated mode");
        if cli.strict {
            std::process::exit(1);
        }
    }

    Ok(())
}
