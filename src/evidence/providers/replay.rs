//! Replays detector output recorded by an external object detector.
//!
//! The file is JSON Lines: line N holds the detections for frame N as an array
//! of `{"box": [x1, y1, x2, y2], "class": 2, "confidence": 0.9}` objects.
//! Blank lines are frames without detections.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::Path;

use crate::evidence::provider::{EvidenceKind, EvidenceProvider};
use crate::evidence::types::{Detection, Evidence};
use crate::ingest::EndOfStream;

pub struct DetectionReplay {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
    end_of_stream: EndOfStream,
    exhausted_logged: bool,
}

impl DetectionReplay {
    pub fn open(path: &Path, end_of_stream: EndOfStream) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read detections file {}", path.display()))?;
        let frames = parse_lines(&raw)
            .map_err(|e| anyhow!("invalid detections file {}: {}", path.display(), e))?;
        log::info!(
            "DetectionReplay: {} frames of detections from {}",
            frames.len(),
            path.display()
        );
        Ok(Self::from_frames(frames, end_of_stream))
    }

    pub fn from_frames(frames: Vec<Vec<Detection>>, end_of_stream: EndOfStream) -> Self {
        Self {
            frames,
            cursor: 0,
            end_of_stream,
            exhausted_logged: false,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn next_detections(&mut self) -> Vec<Detection> {
        if self.cursor >= self.frames.len() {
            match self.end_of_stream {
                EndOfStream::Rewind if !self.frames.is_empty() => self.cursor = 0,
                _ => {
                    if !self.exhausted_logged {
                        log::warn!("DetectionReplay: out of recorded frames, reporting no detections");
                        self.exhausted_logged = true;
                    }
                    return Vec::new();
                }
            }
        }
        let detections = self.frames[self.cursor].clone();
        self.cursor += 1;
        detections
    }
}

impl EvidenceProvider for DetectionReplay {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn kind(&self) -> EvidenceKind {
        EvidenceKind::Detections
    }

    fn evidence(&mut self, _frame: &RgbImage) -> Result<Evidence> {
        Ok(Evidence::Detections(self.next_detections()))
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.exhausted_logged = false;
    }
}

fn parse_lines(raw: &str) -> Result<Vec<Vec<Detection>>> {
    raw.lines()
        .enumerate()
        .map(|(idx, line)| {
            if line.trim().is_empty() {
                return Ok(Vec::new());
            }
            serde_json::from_str(line).map_err(|e| anyhow!("line {}: {}", idx + 1, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn frame() -> RgbImage {
        RgbImage::new(4, 4)
    }

    fn detections(evidence: Evidence) -> Vec<Detection> {
        match evidence {
            Evidence::Detections(d) => d,
            Evidence::MotionMask(_) => panic!("replay produced a mask"),
        }
    }

    #[test]
    fn parses_frames_and_blank_lines() -> Result<()> {
        let frames = parse_lines(
            "[{\"box\": [1, 2, 3, 4], \"class\": 2, \"confidence\": 0.5}]\n\n[]\n",
        )?;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0][0].bbox, BoundingBox::new(1, 2, 3, 4));
        assert!(frames[1].is_empty());
        assert!(frames[2].is_empty());
        Ok(())
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_lines("[]\n{oops}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn stop_policy_goes_quiet_after_last_frame() -> Result<()> {
        let det = Detection::new(BoundingBox::new(0, 0, 1, 1), 2, 0.9);
        let mut replay = DetectionReplay::from_frames(vec![vec![det]], EndOfStream::Stop);
        assert_eq!(detections(replay.evidence(&frame())?).len(), 1);
        assert!(detections(replay.evidence(&frame())?).is_empty());
        Ok(())
    }

    #[test]
    fn rewind_policy_cycles() -> Result<()> {
        let det = Detection::new(BoundingBox::new(0, 0, 1, 1), 2, 0.9);
        let mut replay =
            DetectionReplay::from_frames(vec![vec![det], Vec::new()], EndOfStream::Rewind);
        let counts: Vec<usize> = (0..4)
            .map(|_| replay.evidence(&frame()).map(|e| detections(e).len()))
            .collect::<Result<_>>()?;
        assert_eq!(counts, vec![1, 0, 1, 0]);
        Ok(())
    }

    #[test]
    fn opens_file_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("detections.jsonl");
        fs::write(&path, "[{\"box\": [5, 5, 50, 50], \"class\": 2, \"confidence\": 0.9}]\n")?;
        let replay = DetectionReplay::open(&path, EndOfStream::Stop)?;
        assert_eq!(replay.len(), 1);
        Ok(())
    }
}
