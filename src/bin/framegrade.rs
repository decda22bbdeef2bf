// framegrade - LUT tooling and pipeline runner
// Inspects .cube assets, grades still images, and runs the live frame pipeline
// against a synthetic source and an in-memory surface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framegrade::capability::ColorSpace;
use framegrade::{
    Extent, FramePipeline, LookupTable, MemorySurface, PipelineConfig, Producer, SyntheticSource,
};

#[derive(Parser)]
#[command(name = "framegrade", version, about = "Color-graded frame pipeline")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a .cube file and print its summary
    Inspect {
        /// Path to the .cube asset
        lut: PathBuf,
    },

    /// Grade a still image with a .cube file
    Apply {
        #[arg(long)]
        lut: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Run the live pipeline with a synthetic source and print metrics
    Run {
        /// JSON pipeline config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Default .cube asset (overrides config)
        #[arg(long)]
        lut: Option<PathBuf>,

        /// Active color space used to pick a LUT (log, hlg, srgb)
        #[arg(long)]
        color_space: Option<String>,

        /// Admission capacity (overrides config)
        #[arg(long)]
        capacity: Option<usize>,

        /// Render clock rate (overrides config)
        #[arg(long)]
        render_fps: Option<u32>,

        /// Producer rate, 0 = unpaced (overrides config)
        #[arg(long)]
        source_fps: Option<u32>,

        /// How long to run
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Inspect { lut } => {
            let table = LookupTable::load(&lut)
                .with_context(|| format!("Failed to load {}", lut.display()))?;
            println!("{}", table.summary());
        }
        Command::Apply { lut, input, output } => {
            let table = LookupTable::load(&lut)
                .with_context(|| format!("Failed to load {}", lut.display()))?;
            framegrade::still::grade_file(&input, &output, &table)
                .context("Failed to grade image")?;
        }
        Command::Run {
            config,
            lut,
            color_space,
            capacity,
            render_fps,
            source_fps,
            seconds,
        } => {
            let mut cfg = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if let Some(lut) = lut {
                cfg.lut = Some(lut);
            }
            if let Some(capacity) = capacity {
                cfg.admission_capacity = capacity;
            }
            if let Some(fps) = render_fps {
                cfg.render_fps = fps;
            }
            if let Some(fps) = source_fps {
                cfg.source_fps = fps;
            }

            let color_space = match color_space.as_deref() {
                Some(name) => Some(
                    ColorSpace::parse(name)
                        .with_context(|| format!("Unknown color space '{}'", name))?,
                ),
                None => None,
            };

            let duration = Duration::try_from_secs_f64(seconds)
                .with_context(|| format!("Invalid duration {}s", seconds))?;
            run_pipeline(cfg, color_space, duration).await?;
        }
    }

    Ok(())
}

async fn run_pipeline(
    config: PipelineConfig,
    color_space: Option<ColorSpace>,
    duration: Duration,
) -> Result<()> {
    info!("🎬 Starting framegrade pipeline");
    info!(
        "   Source: {}x{} @ {} fps",
        config.source_width, config.source_height, config.source_fps
    );
    info!(
        "   Surface: {}x{} @ {} fps, capacity {}",
        config.surface_width, config.surface_height, config.render_fps, config.admission_capacity
    );

    let pipeline = FramePipeline::new(config.clone(), color_space)
        .context("Failed to build pipeline")?;

    let surface = Arc::new(MemorySurface::new(Extent::new(
        config.surface_width,
        config.surface_height,
    )));
    let consumer = pipeline.consumer(Arc::clone(&surface));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let render = tokio::spawn(consumer.run(config.render_period(), shutdown_rx));

    let source = SyntheticSource::new(config.source_width, config.source_height, config.source_fps);
    let producer = Producer::spawn(source, Arc::clone(&pipeline), config.source_fps)
        .context("Failed to spawn producer thread")?;

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    render.await.context("Render task failed")?;
    let produced = tokio::task::spawn_blocking(move || producer.stop())
        .await
        .context("Producer join failed")?;
    pipeline.limiter().drained().await;

    info!("   ✓ Producer delivered {} frames", produced);
    let snapshot = pipeline.metrics().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
