//! Frame ingestion sources.
//!
//! This module provides sources for decoded RGB frames:
//! - Local image directories (one still per frame, sorted by file name)
//! - Synthetic parking-lot scenes (`stub://`, for tests and demos)
//!
//! Camera and video decoding live outside the crate; anything that can hand
//! over an `RgbImage` can implement [`FrameSource`].

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::fmt;
use std::str::FromStr;

pub mod file;
pub mod synthetic;

pub use file::{FileConfig, FileSource, FileStats};
pub use synthetic::{CarArrival, SyntheticLot};

/// What a source does once it has delivered its last frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EndOfStream {
    /// Report exhaustion; the frame loop ends.
    #[default]
    Stop,
    /// Start over from the first frame.
    Rewind,
}

impl fmt::Display for EndOfStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndOfStream::Stop => write!(f, "stop"),
            EndOfStream::Rewind => write!(f, "rewind"),
        }
    }
}

impl FromStr for EndOfStream {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(EndOfStream::Stop),
            "rewind" | "loop" => Ok(EndOfStream::Rewind),
            other => Err(anyhow!("unknown end-of-stream policy '{}'", other)),
        }
    }
}

pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Restart from the first frame.
    fn rewind(&mut self) -> Result<()>;

    fn describe(&self) -> String;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Result of pulling one frame under an [`EndOfStream`] policy.
#[derive(Debug)]
pub enum Fetched {
    Frame(RgbImage),
    /// The source ran dry and was rewound; this is its first frame again.
    Rewound(RgbImage),
    /// The stream is over for good.
    Ended,
}

impl Fetched {
    pub fn into_frame(self) -> Option<RgbImage> {
        match self {
            Fetched::Frame(frame) | Fetched::Rewound(frame) => Some(frame),
            Fetched::Ended => None,
        }
    }
}

/// Pull the next frame, applying `policy` when the source runs dry.
pub fn next_frame_with_policy(source: &mut dyn FrameSource, policy: EndOfStream) -> Result<Fetched> {
    if let Some(frame) = source.next_frame()? {
        return Ok(Fetched::Frame(frame));
    }
    match policy {
        EndOfStream::Stop => {
            log::info!("{}: end of stream", source.describe());
            Ok(Fetched::Ended)
        }
        EndOfStream::Rewind => {
            log::info!("{}: end of stream, rewinding", source.describe());
            source.rewind()?;
            Ok(source.next_frame()?.map_or(Fetched::Ended, Fetched::Rewound))
        }
    }
}
