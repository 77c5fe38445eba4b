//! Local file frame source.
//!
//! `FileSource` reads frames from local disk only:
//! - a directory of stills (`.png`, `.jpg`, `.jpeg`), played in file-name order
//! - a single still, served as a one-frame stream
//! - `stub://<name>`, a synthetic parking lot for tests and demos
//!
//! Remote URLs are rejected.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

use super::synthetic::SyntheticLot;
use super::FrameSource;
use crate::geometry::Resolution;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Directory, image file, or `stub://` name.
    pub path: String,
    /// Frame size for synthetic sources. Stills keep their own size.
    pub resolution: Resolution,
    /// Frames a synthetic source serves before running dry (0 = endless).
    pub synthetic_frames: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            resolution: Resolution::default(),
            synthetic_frames: 300,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    path: String,
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticLot),
    Stills(StillSequence),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes), got '{}'",
                config.path
            ));
        }
        let backend = if config.path.starts_with("stub://") {
            FileBackend::Synthetic(SyntheticLot::demo(config.resolution, config.synthetic_frames)?)
        } else {
            FileBackend::Stills(StillSequence::open(Path::new(&config.path))?)
        };
        log::info!("FileSource: opened {}", config.path);
        Ok(Self {
            path: config.path,
            backend,
        })
    }

    /// Synthetic source playing a caller-built scene.
    pub fn synthetic(name: &str, lot: SyntheticLot) -> Self {
        Self {
            path: format!("stub://{}", name),
            backend: FileBackend::Synthetic(lot),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        let frames_captured = match &self.backend {
            FileBackend::Synthetic(lot) => lot.frames_served(),
            FileBackend::Stills(stills) => stills.cursor as u64,
        };
        FileStats {
            frames_captured,
            path: self.path.clone(),
        }
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            FileBackend::Synthetic(lot) => Ok(lot.next_frame()),
            FileBackend::Stills(stills) => stills.next_frame(),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(lot) => lot.rewind(),
            FileBackend::Stills(stills) => stills.cursor = 0,
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("FileSource({})", self.path)
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    /// Frames served since the last rewind.
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Still images
// ----------------------------------------------------------------------------

struct StillSequence {
    files: Vec<PathBuf>,
    cursor: usize,
}

impl StillSequence {
    fn open(path: &Path) -> Result<Self> {
        let files = if path.is_dir() {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("failed to list frames in {}", path.display()))?
            {
                let file = entry?.path();
                if file.is_file() && is_still_image(&file) {
                    files.push(file);
                }
            }
            files.sort();
            files
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(anyhow!("frame source {} does not exist", path.display()));
        };
        if files.is_empty() {
            return Err(anyhow!("no .png/.jpg frames found in {}", path.display()));
        }
        Ok(Self { files, cursor: 0 })
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(file) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let frame = image::open(file)
            .with_context(|| format!("failed to decode frame {}", file.display()))?
            .to_rgb8();
        self.cursor += 1;
        Ok(Some(frame))
    }
}

fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
