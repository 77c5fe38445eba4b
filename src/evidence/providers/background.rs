use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, RgbImage};

use crate::evidence::provider::{EvidenceKind, EvidenceProvider};
use crate::evidence::types::{Evidence, MotionMask};

/// Default per-frame weight of the new frame in the background model.
pub const DEFAULT_LEARNING_RATE: f32 = 0.005;
/// Default luma difference above which a pixel is foreground.
pub const DEFAULT_DIFF_THRESHOLD: u8 = 25;

/// Running-average background subtractor.
///
/// Keeps a per-pixel luma average and marks pixels that differ from it by
/// more than `diff_threshold` as foreground (255). The first frame after
/// construction, a reset or a resolution change only seeds the model and
/// yields an empty mask.
pub struct BackgroundSubtractor {
    learning_rate: f32,
    diff_threshold: u8,
    background: Option<Background>,
}

struct Background {
    width: u32,
    height: u32,
    luma: Vec<f32>,
}

impl BackgroundSubtractor {
    pub fn new(learning_rate: f32, diff_threshold: u8) -> Result<Self> {
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(anyhow!(
                "background learning rate must be in (0, 1], got {}",
                learning_rate
            ));
        }
        Ok(Self {
            learning_rate,
            diff_threshold,
            background: None,
        })
    }

    /// Foreground mask for `frame`, updating the background model.
    pub fn apply(&mut self, frame: &RgbImage) -> MotionMask {
        let (width, height) = frame.dimensions();
        let luma: Vec<f32> = frame.pixels().map(|p| luma_of(&p.0)).collect();

        let threshold = f32::from(self.diff_threshold);
        let rate = self.learning_rate;
        let mut mask = GrayImage::new(width, height);

        let Some(background) = self
            .background
            .as_mut()
            .filter(|bg| bg.width == width && bg.height == height)
        else {
            if self.background.is_some() {
                log::info!(
                    "background model reset: frame size changed to {}x{}",
                    width,
                    height
                );
            }
            self.background = Some(Background {
                width,
                height,
                luma,
            });
            return MotionMask::new(mask);
        };

        for (idx, (bg, current)) in background.luma.iter_mut().zip(luma).enumerate() {
            if (current - *bg).abs() > threshold {
                let x = (idx as u32) % width;
                let y = (idx as u32) / width;
                mask.put_pixel(x, y, Luma([255]));
            }
            *bg += rate * (current - *bg);
        }
        MotionMask::new(mask)
    }
}

impl Default for BackgroundSubtractor {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            background: None,
        }
    }
}

impl EvidenceProvider for BackgroundSubtractor {
    fn name(&self) -> &'static str {
        "background"
    }

    fn kind(&self) -> EvidenceKind {
        EvidenceKind::MotionMask
    }

    fn evidence(&mut self, frame: &RgbImage) -> Result<Evidence> {
        Ok(Evidence::MotionMask(self.apply(frame)))
    }

    fn reset(&mut self) {
        self.background = None;
    }
}

fn luma_of(rgb: &[u8; 3]) -> f32 {
    0.299 * f32::from(rgb[0]) + 0.587 * f32::from(rgb[1]) + 0.114 * f32::from(rgb[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn first_frame_only_seeds_model() {
        let mut sub = BackgroundSubtractor::default();
        let mask = sub.apply(&flat(8, 8, 100));
        assert_eq!(mask.count_nonzero(0, 0, 8, 8), 0);
    }

    #[test]
    fn changed_region_becomes_foreground() {
        let mut sub = BackgroundSubtractor::default();
        sub.apply(&flat(8, 8, 100));

        let mut frame = flat(8, 8, 100);
        for y in 2..4 {
            for x in 2..6 {
                frame.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        let mask = sub.apply(&frame);
        assert_eq!(mask.count_nonzero(0, 0, 8, 8), 8);
        assert_eq!(mask.count_nonzero(2, 2, 4, 2), 8);
    }

    #[test]
    fn static_scene_stays_quiet() {
        let mut sub = BackgroundSubtractor::default();
        for _ in 0..5 {
            let mask = sub.apply(&flat(4, 4, 60));
            assert_eq!(mask.count_nonzero(0, 0, 4, 4), 0);
        }
    }

    #[test]
    fn resolution_change_reseeds() {
        let mut sub = BackgroundSubtractor::default();
        sub.apply(&flat(4, 4, 0));
        let mask = sub.apply(&flat(6, 6, 255));
        assert_eq!(mask.resolution().width, 6);
        assert_eq!(mask.count_nonzero(0, 0, 6, 6), 0);
    }

    #[test]
    fn rejects_bad_learning_rate() {
        assert!(BackgroundSubtractor::new(0.0, 25).is_err());
        assert!(BackgroundSubtractor::new(1.5, 25).is_err());
        assert!(BackgroundSubtractor::new(0.01, 25).is_ok());
    }
}
