//! Occupancy classifier.
//!
//! Maps a zone catalog plus one frame's evidence to a per-spot verdict. The
//! classifier is pure: it holds only its tunables and never fails. Spots it
//! cannot judge (non-positive size after rescaling) keep their previous
//! verdict for this frame.

use anyhow::{anyhow, Result};

use crate::catalog::ZoneCatalog;
use crate::evidence::{Detection, Evidence, MotionMask, VEHICLE_CLASS_ID};
use crate::geometry::{Resolution, Scale, Zone};

/// Default motion ratio above which a spot counts as occupied.
pub const DEFAULT_EMPTY_RATIO_THRESHOLD: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifierConfig {
    /// Fraction of foreground pixels a zone must exceed to be occupied.
    pub empty_ratio_threshold: f64,
    /// Detector class id that counts as a vehicle.
    pub vehicle_class_id: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            empty_ratio_threshold: DEFAULT_EMPTY_RATIO_THRESHOLD,
            vehicle_class_id: VEHICLE_CLASS_ID,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OccupancyClassifier {
    config: ClassifierConfig,
}

impl OccupancyClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        if !config.empty_ratio_threshold.is_finite() || config.empty_ratio_threshold < 0.0 {
            return Err(anyhow!(
                "empty ratio threshold must be a non-negative number, got {}",
                config.empty_ratio_threshold
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Verdicts for every catalog position.
    ///
    /// `frame` is the resolution of the frame the evidence was computed on.
    /// `previous` supplies the value kept for spots that are skipped; missing
    /// slots default to empty.
    pub fn classify(
        &self,
        catalog: &ZoneCatalog,
        evidence: &Evidence,
        frame: Resolution,
        previous: &[bool],
    ) -> Vec<bool> {
        let scale = Scale::between(catalog.reference(), frame);
        catalog
            .spots()
            .iter()
            .enumerate()
            .map(|(idx, spot)| {
                let zone = spot.zone().rescale(scale);
                match self.zone_occupied(&zone, evidence) {
                    Some(occupied) => occupied,
                    None => {
                        log::warn!(
                            "spot {} skipped: zone {}x{} at {},{} has no area in frame {}",
                            spot.id,
                            zone.width,
                            zone.height,
                            zone.x,
                            zone.y,
                            frame
                        );
                        previous.get(idx).copied().unwrap_or(false)
                    }
                }
            })
            .collect()
    }

    /// Verdict for one zone already in frame coordinates; `None` when the
    /// zone is not valid.
    pub fn zone_occupied(&self, zone: &Zone, evidence: &Evidence) -> Option<bool> {
        if !zone.is_valid() {
            return None;
        }
        let occupied = match evidence {
            Evidence::Detections(detections) => {
                detection_overlap(zone, detections, self.config.vehicle_class_id)
            }
            Evidence::MotionMask(mask) => motion_ratio(mask, zone) > self.config.empty_ratio_threshold,
        };
        Some(occupied)
    }
}

/// True when any detection of `vehicle_class_id` intersects `zone`.
pub fn detection_overlap(zone: &Zone, detections: &[Detection], vehicle_class_id: u32) -> bool {
    detections
        .iter()
        .filter(|d| d.class_id == vehicle_class_id)
        .any(|d| zone.overlaps(&d.bbox))
}

/// Fraction of non-zero mask pixels inside `zone`.
///
/// The zone is clipped to the mask first; a region with no area is 0.0.
pub fn motion_ratio(mask: &MotionMask, zone: &Zone) -> f64 {
    let Some((x, y, width, height)) = zone.clip_to(mask.resolution()) else {
        return 0.0;
    };
    let total = u64::from(width) * u64::from(height);
    if total == 0 {
        return 0.0;
    }
    mask.count_nonzero(x, y, width, height) as f64 / total as f64
}
