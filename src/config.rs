use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::annotate::DEFAULT_ALPHA;
use crate::catalog::DEFAULT_CATALOG_PATH;
use crate::classify::DEFAULT_EMPTY_RATIO_THRESHOLD;
use crate::evidence::providers::background::{DEFAULT_DIFF_THRESHOLD, DEFAULT_LEARNING_RATE};
use crate::evidence::VEHICLE_CLASS_ID;
use crate::geometry::Resolution;
use crate::ingest::EndOfStream;
use crate::status::DEFAULT_REPORT_INTERVAL;

const DEFAULT_SOURCE_URL: &str = "stub://parking_lot";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SYNTHETIC_FRAMES: u64 = 300;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    catalog_path: Option<PathBuf>,
    reference: Option<Resolution>,
    source: Option<SourceConfigFile>,
    occupancy: Option<OccupancyConfigFile>,
    annotate: Option<AnnotateConfigFile>,
    report: Option<ReportConfigFile>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    end_of_stream: Option<String>,
    synthetic_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OccupancyConfigFile {
    strategy: Option<String>,
    empty_ratio_threshold: Option<f64>,
    vehicle_class_id: Option<u32>,
    detections_path: Option<PathBuf>,
    learning_rate: Option<f32>,
    diff_threshold: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    alpha: Option<f32>,
    font_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ReportConfigFile {
    interval_ms: Option<u64>,
}

/// Which evidence the occupancy classifier works from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OccupancyStrategy {
    /// Vehicle detections replayed from an external detector.
    Detections,
    /// Foreground ratio from in-process background subtraction.
    #[default]
    MotionMask,
}

impl fmt::Display for OccupancyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccupancyStrategy::Detections => write!(f, "detections"),
            OccupancyStrategy::MotionMask => write!(f, "motion"),
        }
    }
}

impl FromStr for OccupancyStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detections" | "detection" => Ok(OccupancyStrategy::Detections),
            "motion" | "motion_mask" | "motion-mask" => Ok(OccupancyStrategy::MotionMask),
            other => Err(anyhow!("unknown occupancy strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub catalog_path: PathBuf,
    /// Reference resolution for a catalog that does not store one.
    pub reference: Resolution,
    pub source: SourceSettings,
    pub occupancy: OccupancySettings,
    pub annotate: AnnotateSettings,
    pub report_interval: Duration,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub end_of_stream: EndOfStream,
    pub synthetic_frames: u64,
}

#[derive(Debug, Clone)]
pub struct OccupancySettings {
    pub strategy: OccupancyStrategy,
    pub empty_ratio_threshold: f64,
    pub vehicle_class_id: u32,
    pub detections_path: Option<PathBuf>,
    pub learning_rate: f32,
    pub diff_threshold: u8,
}

#[derive(Debug, Clone)]
pub struct AnnotateSettings {
    pub alpha: f32,
    pub font_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

impl MonitorConfig {
    /// Defaults, then the file named by `PARKWATCH_CONFIG`, then `PARKWATCH_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKWATCH_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like [`load`](Self::load) with an explicit config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let occupancy_file = file.occupancy.unwrap_or_default();
        let annotate_file = file.annotate.unwrap_or_default();

        let reference = file.reference.unwrap_or_default();
        let source = SourceSettings {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
            width: source_file.width.unwrap_or(reference.width),
            height: source_file.height.unwrap_or(reference.height),
            end_of_stream: source_file
                .end_of_stream
                .as_deref()
                .map(str::parse)
                .transpose()?
                .unwrap_or_default(),
            synthetic_frames: source_file
                .synthetic_frames
                .unwrap_or(DEFAULT_SYNTHETIC_FRAMES),
        };
        let occupancy = OccupancySettings {
            strategy: occupancy_file
                .strategy
                .as_deref()
                .map(str::parse)
                .transpose()?
                .unwrap_or_default(),
            empty_ratio_threshold: occupancy_file
                .empty_ratio_threshold
                .unwrap_or(DEFAULT_EMPTY_RATIO_THRESHOLD),
            vehicle_class_id: occupancy_file.vehicle_class_id.unwrap_or(VEHICLE_CLASS_ID),
            detections_path: occupancy_file.detections_path,
            learning_rate: occupancy_file.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            diff_threshold: occupancy_file
                .diff_threshold
                .unwrap_or(DEFAULT_DIFF_THRESHOLD),
        };
        let annotate = AnnotateSettings {
            alpha: annotate_file.alpha.unwrap_or(DEFAULT_ALPHA),
            font_path: annotate_file.font_path,
            output_path: annotate_file.output_path,
        };
        let report_interval = file
            .report
            .and_then(|report| report.interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REPORT_INTERVAL);
        Ok(Self {
            catalog_path: file
                .catalog_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH)),
            reference,
            source,
            occupancy,
            annotate,
            report_interval,
            max_frames: file.max_frames,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_nonempty("PARKWATCH_CATALOG") {
            self.catalog_path = PathBuf::from(path);
        }
        if let Some(reference) = env_nonempty("PARKWATCH_REFERENCE") {
            self.reference = reference.parse()?;
        }
        if let Some(url) = env_nonempty("PARKWATCH_SOURCE") {
            self.source.url = url;
        }
        if let Some(fps) = env_nonempty("PARKWATCH_FPS") {
            self.source.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_FPS must be an integer frame rate"))?;
        }
        if let Some(policy) = env_nonempty("PARKWATCH_END_OF_STREAM") {
            self.source.end_of_stream = policy.parse()?;
        }
        if let Some(strategy) = env_nonempty("PARKWATCH_STRATEGY") {
            self.occupancy.strategy = strategy.parse()?;
        }
        if let Some(threshold) = env_nonempty("PARKWATCH_THRESHOLD") {
            self.occupancy.empty_ratio_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_THRESHOLD must be a number"))?;
        }
        if let Some(class_id) = env_nonempty("PARKWATCH_VEHICLE_CLASS") {
            self.occupancy.vehicle_class_id = class_id
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_VEHICLE_CLASS must be an integer class id"))?;
        }
        if let Some(path) = env_nonempty("PARKWATCH_DETECTIONS") {
            self.occupancy.detections_path = Some(PathBuf::from(path));
        }
        if let Some(alpha) = env_nonempty("PARKWATCH_ALPHA") {
            self.annotate.alpha = alpha
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_ALPHA must be a number"))?;
        }
        if let Some(path) = env_nonempty("PARKWATCH_FONT") {
            self.annotate.font_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_nonempty("PARKWATCH_OUTPUT") {
            self.annotate.output_path = Some(PathBuf::from(path));
        }
        if let Some(interval) = env_nonempty("PARKWATCH_REPORT_INTERVAL_MS") {
            let millis: u64 = interval.parse().map_err(|_| {
                anyhow!("PARKWATCH_REPORT_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.report_interval = Duration::from_millis(millis);
        }
        if let Some(max_frames) = env_nonempty("PARKWATCH_MAX_FRAMES") {
            self.max_frames = Some(
                max_frames
                    .parse()
                    .map_err(|_| anyhow!("PARKWATCH_MAX_FRAMES must be an integer"))?,
            );
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.reference.is_empty() {
            return Err(anyhow!("reference resolution must be non-zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be non-zero"));
        }
        let threshold = self.occupancy.empty_ratio_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(anyhow!(
                "empty_ratio_threshold must be a non-negative number, got {}",
                threshold
            ));
        }
        if self.occupancy.strategy == OccupancyStrategy::Detections
            && self.occupancy.detections_path.is_none()
        {
            return Err(anyhow!(
                "detections strategy requires occupancy.detections_path (or PARKWATCH_DETECTIONS)"
            ));
        }
        let rate = self.occupancy.learning_rate;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(anyhow!("learning_rate must be in (0, 1], got {}", rate));
        }
        if !(0.0..=1.0).contains(&self.annotate.alpha) {
            return Err(anyhow!(
                "annotate alpha must be within [0, 1], got {}",
                self.annotate.alpha
            ));
        }
        if self.report_interval.is_zero() {
            return Err(anyhow!("report interval must be greater than zero"));
        }
        if self.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero when set"));
        }
        Ok(())
    }

    /// Delay between frames at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.source.target_fps.max(1)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
