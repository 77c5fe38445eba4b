//! parkwatch - parking occupancy monitor daemon
//!
//! This daemon:
//! 1. Loads the spot catalog and configuration
//! 2. Pulls frames from the configured source (image directory or `stub://`)
//! 3. Classifies every spot per frame and publishes the status snapshot
//! 4. Writes the annotated frame to the configured output path
//! 5. Logs the status table from a background reporter thread

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parkwatch::ingest::{next_frame_with_policy, Fetched};
use parkwatch::status::spawn_reporter;
use parkwatch::{
    CatalogStore, FileConfig, FileSource, FrameSource, MonitorConfig, OccupancyPipeline,
    Resolution,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Parking occupancy monitor")]
struct Args {
    /// JSON or TOML config file.
    #[arg(long, env = "PARKWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many frames (overrides the config file).
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = MonitorConfig::load_from(args.config.as_deref())?;
    if let Some(max_frames) = args.max_frames {
        if max_frames == 0 {
            return Err(anyhow!("--max-frames must be >= 1"));
        }
        cfg.max_frames = Some(max_frames);
    }

    let store = CatalogStore::new(&cfg.catalog_path);
    let catalog = store.load(cfg.reference)?;
    if catalog.is_empty() {
        log::warn!(
            "catalog {} has no spots; run spot_editor to define some",
            store.path().display()
        );
    }

    let mut source = FileSource::new(FileConfig {
        path: cfg.source.url.clone(),
        resolution: Resolution::new(cfg.source.width, cfg.source.height),
        synthetic_frames: cfg.source.synthetic_frames,
    })?;
    let mut pipeline = OccupancyPipeline::from_config(&cfg, catalog)?;
    let reporter = spawn_reporter(pipeline.tracker(), cfg.report_interval)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "parkwatch running: source={} strategy={} threshold={} end_of_stream={}",
        cfg.source.url,
        cfg.occupancy.strategy,
        cfg.occupancy.empty_ratio_threshold,
        cfg.source.end_of_stream
    );
    if let Some(path) = &cfg.annotate.output_path {
        log::info!("annotated frames written to {}", path.display());
    }

    let frame_interval = cfg.frame_interval();
    let mut last_health_log = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        if cfg
            .max_frames
            .is_some_and(|max| pipeline.frames_processed() >= max)
        {
            log::info!("reached max_frames={}", pipeline.frames_processed());
            break;
        }
        let started = Instant::now();

        let frame = match next_frame_with_policy(&mut source, cfg.source.end_of_stream)? {
            Fetched::Frame(frame) => frame,
            Fetched::Rewound(frame) => {
                pipeline.reset_evidence();
                frame
            }
            Fetched::Ended => break,
        };

        let outcome = pipeline.process_frame(&frame)?;
        log::debug!("frame {}: {}", pipeline.frames_processed(), outcome.snapshot.summary());
        if let Some(path) = &cfg.annotate.output_path {
            write_frame_atomic(path, &outcome.annotated)?;
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "source health={} frames={} path={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.path
            );
            last_health_log = Instant::now();
        }

        if let Some(remaining) = frame_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    reporter.stop();
    let snapshot = pipeline.tracker().snapshot()?;
    log::info!(
        "parkwatch stopped after {} frames, final status {}",
        pipeline.frames_processed(),
        serde_json::to_string(snapshot.as_ref())?
    );
    Ok(())
}

/// Replace `path` with `frame` so readers never see a half-written image.
fn write_frame_atomic(path: &Path, frame: &RgbImage) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| anyhow!("unsupported output image {}: {}", path.display(), e))?;
    let tmp_path = path.with_extension("tmp");
    frame
        .save_with_format(&tmp_path, format)
        .with_context(|| format!("failed to write frame {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to replace frame {}", path.display()))?;
    Ok(())
}
