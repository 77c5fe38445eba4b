//! One step of the frame loop: evidence, classification, status publication
//! and annotation for a single frame.
//!
//! The evidence stage is injected, so the same pipeline runs detection
//! overlap and motion-ratio occupancy.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::sync::Arc;

use crate::annotate::{load_font, FrameAnnotator};
use crate::catalog::ZoneCatalog;
use crate::classify::{ClassifierConfig, OccupancyClassifier};
use crate::config::{MonitorConfig, OccupancySettings, OccupancyStrategy};
use crate::evidence::{BackgroundSubtractor, DetectionReplay, Evidence, EvidenceProvider};
use crate::geometry::Resolution;
use crate::ingest::EndOfStream;
use crate::status::{StatusSnapshot, StatusTracker};

pub struct FrameOutcome {
    pub annotated: RgbImage,
    pub snapshot: Arc<StatusSnapshot>,
}

pub struct OccupancyPipeline {
    catalog: ZoneCatalog,
    classifier: OccupancyClassifier,
    annotator: FrameAnnotator,
    provider: Box<dyn EvidenceProvider>,
    tracker: Arc<StatusTracker>,
    frames_processed: u64,
}

impl OccupancyPipeline {
    /// The status tracker is sized to the catalog here.
    pub fn new(
        catalog: ZoneCatalog,
        classifier: OccupancyClassifier,
        annotator: FrameAnnotator,
        provider: Box<dyn EvidenceProvider>,
    ) -> Self {
        let tracker = Arc::new(StatusTracker::new(catalog.len()));
        log::info!(
            "pipeline ready: {} spots, evidence from {} ({:?})",
            catalog.len(),
            provider.name(),
            provider.kind()
        );
        Self {
            catalog,
            classifier,
            annotator,
            provider,
            tracker,
            frames_processed: 0,
        }
    }

    /// Pipeline wired from configuration: classifier tunables, annotator
    /// font and the evidence provider for the configured strategy.
    pub fn from_config(config: &MonitorConfig, catalog: ZoneCatalog) -> Result<Self> {
        let classifier = OccupancyClassifier::new(ClassifierConfig {
            empty_ratio_threshold: config.occupancy.empty_ratio_threshold,
            vehicle_class_id: config.occupancy.vehicle_class_id,
        })?;
        let mut annotator = FrameAnnotator::new(config.annotate.alpha)?;
        if let Some(path) = &config.annotate.font_path {
            annotator = annotator.with_font(load_font(path)?);
        }
        let provider = evidence_provider(&config.occupancy, config.source.end_of_stream)?;
        Ok(Self::new(catalog, classifier, annotator, provider))
    }

    pub fn tracker(&self) -> Arc<StatusTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn process_frame(&mut self, frame: &RgbImage) -> Result<FrameOutcome> {
        let resolution = Resolution::from(frame.dimensions());
        let evidence = self.provider.evidence(frame)?;
        if let Evidence::MotionMask(mask) = &evidence {
            if mask.resolution() != resolution {
                return Err(anyhow!(
                    "{} produced a {} mask for a {} frame",
                    self.provider.name(),
                    mask.resolution(),
                    resolution
                ));
            }
        }

        let previous = self.tracker.snapshot()?;
        let occupied = self
            .classifier
            .classify(&self.catalog, &evidence, resolution, &previous.occupied);
        self.tracker.publish(occupied)?;
        let snapshot = self.tracker.snapshot()?;

        let annotated = self
            .annotator
            .annotate(frame, &self.catalog, &snapshot.occupied);
        self.frames_processed += 1;
        Ok(FrameOutcome { annotated, snapshot })
    }

    /// Forget provider state, e.g. after the source rewinds.
    pub fn reset_evidence(&mut self) {
        self.provider.reset();
    }
}

/// Evidence provider for the configured strategy.
///
/// Replayed detections follow the frame source's end-of-stream policy so
/// both stay aligned frame for frame.
pub fn evidence_provider(
    settings: &OccupancySettings,
    end_of_stream: EndOfStream,
) -> Result<Box<dyn EvidenceProvider>> {
    match settings.strategy {
        OccupancyStrategy::MotionMask => Ok(Box::new(BackgroundSubtractor::new(
            settings.learning_rate,
            settings.diff_threshold,
        )?)),
        OccupancyStrategy::Detections => {
            let path = settings
                .detections_path
                .as_deref()
                .ok_or_else(|| anyhow!("detections strategy needs a detections file"))?;
            Ok(Box::new(DetectionReplay::open(path, end_of_stream)?))
        }
    }
}
