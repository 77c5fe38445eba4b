use anyhow::Result;
use image::RgbImage;

use super::types::Evidence;

/// The two kinds of evidence the classifier understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvidenceKind {
    Detections,
    MotionMask,
}

/// Evidence provider trait.
///
/// Implementations receive each decoded frame exactly once and in capture
/// order, so stateful models (background subtraction, replay cursors) can
/// advance per call.
pub trait EvidenceProvider: Send {
    /// Provider identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Kind of evidence this provider produces.
    fn kind(&self) -> EvidenceKind;

    /// Produce evidence for one frame.
    fn evidence(&mut self, frame: &RgbImage) -> Result<Evidence>;

    /// Forget accumulated state, e.g. after the frame source rewinds.
    fn reset(&mut self) {}
}
