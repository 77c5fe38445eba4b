//! Pixel geometry shared by the spot editor, the classifier and the annotator.
//!
//! Spots are stored in reference-image coordinates. Everything that touches a
//! live frame goes through [`Scale`] first so that a catalog drawn on a
//! 1280x720 still keeps working against a 640x360 camera.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_REFERENCE_WIDTH: u32 = 1280;
pub const DEFAULT_REFERENCE_HEIGHT: u32 = 720;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        dx.hypot(dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Parses `"x,y"`.
impl FromStr for Point {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("point must be formatted as x,y (got '{}')", s))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid x coordinate in '{}'", s))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid y coordinate in '{}'", s))?;
        Ok(Self { x, y })
    }
}

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_WIDTH, DEFAULT_REFERENCE_HEIGHT)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses `"WIDTHxHEIGHT"`, e.g. `1280x720`.
impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("resolution must be formatted as WIDTHxHEIGHT (got '{}')", s))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid width in '{}'", s))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid height in '{}'", s))?;
        let res = Self::new(width, height);
        if res.is_empty() {
            return Err(anyhow!("resolution must be non-zero (got '{}')", s));
        }
        Ok(res)
    }
}

/// Linear mapping from reference coordinates into frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    pub sx: f64,
    pub sy: f64,
}

impl Scale {
    pub const IDENTITY: Scale = Scale { sx: 1.0, sy: 1.0 };

    /// Scale factors `(frame.width / reference.width, frame.height / reference.height)`.
    ///
    /// A degenerate reference yields the identity mapping.
    pub fn between(reference: Resolution, frame: Resolution) -> Self {
        if reference.is_empty() {
            return Self::IDENTITY;
        }
        Self {
            sx: f64::from(frame.width) / f64::from(reference.width),
            sy: f64::from(frame.height) / f64::from(reference.height),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.sx == 1.0 && self.sy == 1.0
    }
}

/// Axis-aligned rectangle given as origin plus size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Zone {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Zones with a non-positive side take no part in classification or drawing.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn rescale(&self, scale: Scale) -> Zone {
        if scale.is_identity() {
            return *self;
        }
        Zone {
            x: scale_coord(self.x, scale.sx),
            y: scale_coord(self.y, scale.sy),
            width: scale_coord(self.width, scale.sx),
            height: scale_coord(self.height, scale.sy),
        }
    }

    /// Open-interval intersection test against a detection box.
    pub fn overlaps(&self, bbox: &BoundingBox) -> bool {
        bbox.overlaps(self)
    }

    /// Intersection with `[0, bounds.width) x [0, bounds.height)` as
    /// `(x, y, width, height)`; `None` when nothing is left.
    pub fn clip_to(&self, bounds: Resolution) -> Option<(u32, u32, u32, u32)> {
        let max_x = i64::from(bounds.width);
        let max_y = i64::from(bounds.height);
        let x0 = i64::from(self.x).clamp(0, max_x);
        let y0 = i64::from(self.y).clamp(0, max_y);
        let x1 = (i64::from(self.x) + i64::from(self.width)).clamp(0, max_x);
        let y1 = (i64::from(self.y) + i64::from(self.height)).clamp(0, max_y);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

fn scale_coord(value: i32, factor: f64) -> i32 {
    let scaled = (f64::from(value) * factor).round();
    scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Detector box in corner form `(x1, y1, x2, y2)`.
///
/// Serialized as a four element array to match detector output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn overlaps(&self, zone: &Zone) -> bool {
        self.x1 < zone.right() && self.x2 > zone.x && self.y1 < zone.bottom() && self.y2 > zone.y
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl From<Zone> for BoundingBox {
    fn from(z: Zone) -> Self {
        Self::new(z.x, z.y, z.right(), z.bottom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_symmetric() {
        let zones = [
            Zone::new(10, 10, 90, 25),
            Zone::new(0, 0, 5, 5),
            Zone::new(-20, 40, 30, 30),
        ];
        let boxes = [
            BoundingBox::new(5, 5, 50, 50),
            BoundingBox::new(200, 200, 250, 250),
            BoundingBox::new(5, 0, 10, 5),
            BoundingBox::new(-30, 35, -10, 45),
        ];
        for z in &zones {
            for b in &boxes {
                let as_box = BoundingBox::from(*z);
                let as_zone = Zone::new(b.x1, b.y1, b.x2 - b.x1, b.y2 - b.y1);
                assert_eq!(z.overlaps(b), as_zone.overlaps(&as_box), "{:?} vs {:?}", z, b);
            }
        }
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let zone = Zone::new(10, 10, 10, 10);
        assert!(!zone.overlaps(&BoundingBox::new(20, 10, 30, 20)));
        assert!(!zone.overlaps(&BoundingBox::new(0, 0, 10, 10)));
        assert!(zone.overlaps(&BoundingBox::new(19, 19, 30, 30)));
    }

    #[test]
    fn rescale_to_reference_is_identity() {
        let reference = Resolution::default();
        let scale = Scale::between(reference, reference);
        let zone = Zone::new(417, 233, 90, 25);
        assert_eq!(zone.rescale(scale), zone);
    }

    #[test]
    fn rescale_halves_for_half_resolution() {
        let scale = Scale::between(Resolution::new(1280, 720), Resolution::new(640, 360));
        assert_eq!(
            Zone::new(100, 50, 90, 26).rescale(scale),
            Zone::new(50, 25, 45, 13)
        );
    }

    #[test]
    fn clip_drops_zones_outside_bounds() {
        let bounds = Resolution::new(100, 100);
        assert_eq!(Zone::new(90, 90, 20, 20).clip_to(bounds), Some((90, 90, 10, 10)));
        assert_eq!(Zone::new(120, 0, 20, 20).clip_to(bounds), None);
        assert_eq!(Zone::new(-10, -10, 20, 20).clip_to(bounds), Some((0, 0, 10, 10)));
    }

    #[test]
    fn parses_points_and_resolutions() -> Result<()> {
        assert_eq!("12, 34".parse::<Point>()?, Point::new(12, 34));
        assert!("12".parse::<Point>().is_err());
        assert_eq!("640x480".parse::<Resolution>()?, Resolution::new(640, 480));
        assert!("0x480".parse::<Resolution>().is_err());
        Ok(())
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Point::new(0, 0).distance_to(Point::new(3, 4)), 5.0);
    }
}
