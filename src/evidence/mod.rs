//! Per-frame evidence for the occupancy classifier.
//!
//! Evidence comes from a stage outside the classifier: an object detector or a
//! background subtractor. The [`EvidenceProvider`] trait is the seam where that
//! stage plugs into the pipeline; the providers in [`providers`] cover a
//! running-average background model and replay of detector output.

mod provider;
pub mod providers;
mod types;

pub use provider::{EvidenceKind, EvidenceProvider};
pub use providers::{BackgroundSubtractor, DetectionReplay};
pub use types::{Detection, Evidence, MotionMask, VEHICLE_CLASS_ID};
