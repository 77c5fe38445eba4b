//! Frame annotator: outlines every spot in its occupancy color, labels it,
//! and alpha-blends the overlay back onto the frame.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::ZoneCatalog;
use crate::geometry::{Resolution, Scale, Zone};

pub const DEFAULT_ALPHA: f32 = 0.7;

pub const OCCUPIED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const EMPTY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const OUTLINE_THICKNESS: u32 = 2;
/// Label baseline relative to the spot's top-left corner.
const LABEL_BASELINE: (i32, i32) = (4, 20);
const LABEL_SCALE: f32 = 14.0;

pub struct FrameAnnotator {
    alpha: f32,
    font: Option<FontArc>,
    missing_font_logged: AtomicBool,
}

impl FrameAnnotator {
    /// `alpha` is the overlay weight in `[0, 1]`.
    pub fn new(alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(anyhow!("blend alpha must be within [0, 1], got {}", alpha));
        }
        Ok(Self {
            alpha,
            font: None,
            missing_font_logged: AtomicBool::new(false),
        })
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Annotated copy of `frame`. Spots without a status slot are drawn as empty.
    pub fn annotate(&self, frame: &RgbImage, catalog: &ZoneCatalog, occupied: &[bool]) -> RgbImage {
        let frame_res = Resolution::from(frame.dimensions());
        let scale = Scale::between(catalog.reference(), frame_res);
        let mut overlay = frame.clone();

        for (idx, spot) in catalog.spots().iter().enumerate() {
            let zone = spot.zone().rescale(scale);
            if !zone.is_valid() {
                log::debug!("spot {} not drawn: zone has no area", spot.id);
                continue;
            }
            let is_occupied = occupied.get(idx).copied().unwrap_or(false);
            let (color, label) = if is_occupied {
                (OCCUPIED_COLOR, "occupied")
            } else {
                (EMPTY_COLOR, "empty")
            };
            draw_outline(&mut overlay, &zone, color, OUTLINE_THICKNESS);
            self.draw_label(
                &mut overlay,
                zone.x + LABEL_BASELINE.0,
                zone.y + LABEL_BASELINE.1,
                label,
            );
        }

        blend(&overlay, frame, self.alpha)
    }

    fn draw_label(&self, canvas: &mut RgbImage, x: i32, baseline_y: i32, text: &str) {
        match &self.font {
            Some(font) => {
                let scale = PxScale::from(LABEL_SCALE);
                let y = text_top(font, scale, baseline_y);
                draw_text_mut(canvas, LABEL_COLOR, x, y, scale, font, text);
            }
            None => {
                if !self.missing_font_logged.swap(true, Ordering::Relaxed) {
                    log::warn!("no label font configured, drawing spot outlines only");
                }
            }
        }
    }
}

/// Load a TrueType/OpenType font for labels.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}

/// Top edge to hand to the text renderer so the baseline lands on `baseline_y`.
pub(crate) fn text_top(font: &FontArc, scale: PxScale, baseline_y: i32) -> i32 {
    top_for_baseline(baseline_y, font.as_scaled(scale).ascent())
}

fn top_for_baseline(baseline_y: i32, ascent: f32) -> i32 {
    baseline_y - ascent.round() as i32
}

/// Hollow rectangle `thickness` pixels wide, growing inwards from the zone edge.
pub(crate) fn draw_outline(canvas: &mut RgbImage, zone: &Zone, color: Rgb<u8>, thickness: u32) {
    for inset in 0..thickness as i32 {
        let width = zone.width - 2 * inset;
        let height = zone.height - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(zone.x + inset, zone.y + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// `alpha * overlay + (1 - alpha) * base`, per channel.
pub fn blend(overlay: &RgbImage, base: &RgbImage, alpha: f32) -> RgbImage {
    let beta = 1.0 - alpha;
    let mut out = base.clone();
    for (dst, (o, b)) in out.pixels_mut().zip(overlay.pixels().zip(base.pixels())) {
        for c in 0..3 {
            let v = alpha * f32::from(o.0[c]) + beta * f32::from(b.0[c]);
            dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParkingSpot;

    fn catalog(reference: Resolution, spots: &[(i32, i32, i32, i32)]) -> ZoneCatalog {
        ZoneCatalog::from_spots(
            reference,
            spots
                .iter()
                .enumerate()
                .map(|(id, &(x, y, width, height))| ParkingSpot {
                    id: id as u32,
                    x,
                    y,
                    width,
                    height,
                })
                .collect(),
        )
    }

    #[test]
    fn rejects_alpha_outside_unit_range() {
        assert!(FrameAnnotator::new(-0.1).is_err());
        assert!(FrameAnnotator::new(1.1).is_err());
        assert!(FrameAnnotator::new(0.0).is_ok());
    }

    #[test]
    fn outlines_use_occupancy_colors() -> Result<()> {
        let frame = RgbImage::new(100, 100);
        let cat = catalog(Resolution::new(100, 100), &[(10, 10, 30, 20), (50, 50, 30, 20)]);
        let out = FrameAnnotator::new(1.0)?.annotate(&frame, &cat, &[true, false]);

        assert_eq!(*out.get_pixel(10, 10), OCCUPIED_COLOR);
        assert_eq!(*out.get_pixel(11, 11), OCCUPIED_COLOR);
        assert_eq!(*out.get_pixel(50, 50), EMPTY_COLOR);
        // Outline is two pixels wide; the interior is untouched without a font.
        assert_eq!(*out.get_pixel(13, 13), Rgb([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn outlines_follow_frame_resolution() -> Result<()> {
        let frame = RgbImage::new(50, 50);
        let cat = catalog(Resolution::new(100, 100), &[(20, 20, 40, 40)]);
        let out = FrameAnnotator::new(1.0)?.annotate(&frame, &cat, &[false]);
        assert_eq!(*out.get_pixel(10, 10), EMPTY_COLOR);
        assert_eq!(*out.get_pixel(20, 20), Rgb([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn invalid_spots_are_not_drawn() -> Result<()> {
        let frame = RgbImage::new(20, 20);
        let cat = catalog(Resolution::new(20, 20), &[(5, 5, 0, 10)]);
        let out = FrameAnnotator::new(1.0)?.annotate(&frame, &cat, &[true]);
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
        Ok(())
    }

    #[test]
    fn label_baseline_sits_below_spot_corner() {
        let zone = Zone::new(100, 100, 90, 25);
        let baseline = zone.y + LABEL_BASELINE.1;
        assert_eq!(baseline, 120);
        // A 14px face with ~11px ascent starts drawing 11px above the baseline.
        assert_eq!(top_for_baseline(baseline, 11.2), 109);
        assert_eq!(top_for_baseline(baseline, 0.0), baseline);
    }

    #[test]
    fn blend_weights_overlay_by_alpha() {
        let overlay = RgbImage::from_pixel(2, 2, Rgb([200, 100, 0]));
        let base = RgbImage::from_pixel(2, 2, Rgb([0, 100, 200]));
        let out = blend(&overlay, &base, 0.7);
        assert_eq!(*out.get_pixel(0, 0), Rgb([140, 100, 60]));
        assert_eq!(blend(&overlay, &base, 0.0), base);
    }

    #[test]
    fn annotate_leaves_input_untouched() -> Result<()> {
        let frame = RgbImage::from_pixel(40, 40, Rgb([9, 9, 9]));
        let cat = catalog(Resolution::new(40, 40), &[(0, 0, 20, 20)]);
        let _ = FrameAnnotator::new(DEFAULT_ALPHA)?.annotate(&frame, &cat, &[true]);
        assert!(frame.pixels().all(|p| *p == Rgb([9, 9, 9])));
        Ok(())
    }
}
