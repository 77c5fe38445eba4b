use anyhow::{anyhow, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::provider::EvidenceKind;
use crate::geometry::{BoundingBox, Resolution};

/// COCO class id for "car", the class the detector strategy treats as a vehicle.
pub const VEHICLE_CLASS_ID: u32 = 2;

/// One detector hit in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(rename = "class")]
    pub class_id: u32,
    #[serde(default)]
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// Single-channel foreground mask. Any non-zero pixel counts as motion.
#[derive(Clone, Debug)]
pub struct MotionMask {
    mask: GrayImage,
}

impl MotionMask {
    pub fn new(mask: GrayImage) -> Self {
        Self { mask }
    }

    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("mask dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "mask length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let mask = GrayImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("mask buffer does not match {}x{}", width, height))?;
        Ok(Self { mask })
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::from(self.mask.dimensions())
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    /// Non-zero pixels inside `[x, x + width) x [y, y + height)`.
    ///
    /// The region must already be clipped to the mask.
    pub fn count_nonzero(&self, x: u32, y: u32, width: u32, height: u32) -> u64 {
        let mut count = 0u64;
        for row in y..y + height {
            for col in x..x + width {
                if self.mask.get_pixel(col, row).0[0] != 0 {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Per-frame input to the classifier.
#[derive(Clone, Debug)]
pub enum Evidence {
    Detections(Vec<Detection>),
    MotionMask(MotionMask),
}

impl Evidence {
    pub fn kind(&self) -> EvidenceKind {
        match self {
            Evidence::Detections(_) => EvidenceKind::Detections,
            Evidence::MotionMask(_) => EvidenceKind::MotionMask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_reads_detector_json() -> Result<()> {
        let det: Detection =
            serde_json::from_str(r#"{"box": [5, 5, 50, 50], "class": 2, "confidence": 0.9}"#)?;
        assert_eq!(det.bbox, BoundingBox::new(5, 5, 50, 50));
        assert_eq!(det.class_id, VEHICLE_CLASS_ID);
        assert!((det.confidence - 0.9).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn counts_nonzero_inside_region() -> Result<()> {
        let mut pixels = vec![0u8; 16];
        pixels[5] = 255; // (1, 1)
        pixels[6] = 1; // (2, 1)
        pixels[15] = 9; // (3, 3)
        let mask = MotionMask::from_raw(4, 4, pixels)?;
        assert_eq!(mask.count_nonzero(0, 0, 4, 4), 3);
        assert_eq!(mask.count_nonzero(1, 1, 2, 2), 2);
        assert_eq!(mask.count_nonzero(0, 0, 1, 1), 0);
        Ok(())
    }

    #[test]
    fn rejects_short_mask_buffer() {
        assert!(MotionMask::from_raw(4, 4, vec![0u8; 15]).is_err());
    }
}
