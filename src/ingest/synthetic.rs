//! Synthetic parking-lot scenes for `stub://` sources.
//!
//! Frames are flat asphalt with mild sensor noise. Cars are solid blocks that
//! appear at a given frame and stay until they leave (if ever). Noise stays
//! well below the background subtractor's default difference threshold so
//! only cars register as motion.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::{Resolution, Zone};

const ASPHALT: [u8; 3] = [90, 90, 96];
const CAR: [u8; 3] = [20, 40, 200];
const NOISE_AMPLITUDE: i16 = 4;
const NOISE_SEED: u64 = 0x5eed_0f_1075;

/// A car occupying `zone` (frame pixels) for frames in `[arrives, leaves)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CarArrival {
    pub zone: Zone,
    pub arrives: u64,
    pub leaves: Option<u64>,
}

impl CarArrival {
    pub fn present_at(&self, frame: u64) -> bool {
        frame >= self.arrives && self.leaves.map_or(true, |leaves| frame < leaves)
    }
}

pub struct SyntheticLot {
    resolution: Resolution,
    frames: u64,
    cars: Vec<CarArrival>,
    rng: StdRng,
    frame_index: u64,
}

impl SyntheticLot {
    /// Empty lot of `frames` frames; `frames == 0` never runs dry.
    pub fn new(resolution: Resolution, frames: u64) -> Result<Self> {
        if resolution.is_empty() {
            return Err(anyhow!("synthetic lot needs a non-empty resolution"));
        }
        Ok(Self {
            resolution,
            frames,
            cars: Vec::new(),
            rng: StdRng::seed_from_u64(NOISE_SEED),
            frame_index: 0,
        })
    }

    /// The scene `stub://` sources play: one car parks in the upper-left
    /// quarter on frame 5.
    pub fn demo(resolution: Resolution, frames: u64) -> Result<Self> {
        let (w, h) = (resolution.width as i32, resolution.height as i32);
        let car = Zone::new(w / 8, h / 8, w / 4, h / 6);
        Ok(Self::new(resolution, frames)?.with_car(CarArrival {
            zone: car,
            arrives: 5,
            leaves: None,
        }))
    }

    pub fn with_car(mut self, car: CarArrival) -> Self {
        self.cars.push(car);
        self
    }

    pub fn frames_served(&self) -> u64 {
        self.frame_index
    }

    pub fn next_frame(&mut self) -> Option<RgbImage> {
        if self.frames != 0 && self.frame_index >= self.frames {
            return None;
        }
        let frame = self.render(self.frame_index);
        self.frame_index += 1;
        Some(frame)
    }

    pub fn rewind(&mut self) {
        self.frame_index = 0;
        self.rng = StdRng::seed_from_u64(NOISE_SEED);
    }

    fn render(&mut self, index: u64) -> RgbImage {
        let rng = &mut self.rng;
        let mut frame = RgbImage::from_fn(self.resolution.width, self.resolution.height, |_, _| {
            let jitter = rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
            Rgb(ASPHALT.map(|c| (i16::from(c) + jitter).clamp(0, 255) as u8))
        });
        for car in self.cars.iter().filter(|car| car.present_at(index)) {
            let Some((x, y, width, height)) = car.zone.clip_to(self.resolution) else {
                continue;
            };
            for py in y..y + height {
                for px in x..x + width {
                    frame.put_pixel(px, py, Rgb(CAR));
                }
            }
        }
        frame
    }
}
