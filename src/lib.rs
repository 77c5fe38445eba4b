//! Parking occupancy engine.
//!
//! Watches a fixed camera view of a parking lot and reports, per operator
//! defined spot, whether a vehicle occupies it.
//!
//! # Architecture
//!
//! Per frame: frame source → evidence provider → occupancy classifier →
//! status tracker → frame annotator. The evidence is either vehicle
//! detections (bounding-box overlap) or a motion mask (foreground ratio);
//! everything after the provider is the same for both.
//!
//! # Module Structure
//!
//! - `geometry`: points, resolutions, zones, detection boxes, rescaling
//! - `catalog`: ordered spot list and its JSON store
//! - `editor`: spot placement (single and line subdivision), delete, presets
//! - `evidence`: `EvidenceProvider` seam, background subtraction, detection replay
//! - `classify`: pure per-spot occupancy verdicts
//! - `status`: atomically swapped status snapshots and the periodic reporter
//! - `annotate`: colored overlays blended onto frames
//! - `ingest`: frame sources (image directories, synthetic `stub://` lots)
//! - `pipeline`: one frame-loop step wiring the above
//! - `config`: daemon configuration (file + environment)

pub mod annotate;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod editor;
pub mod evidence;
pub mod geometry;
pub mod ingest;
pub mod pipeline;
pub mod status;

pub use annotate::FrameAnnotator;
pub use catalog::{CatalogStore, ParkingSpot, ZoneCatalog};
pub use classify::{ClassifierConfig, OccupancyClassifier};
pub use config::{MonitorConfig, OccupancyStrategy};
pub use editor::{EditOutcome, EditorInput, EditorMode, SpotEditor, SpotPreset};
pub use evidence::{Detection, Evidence, EvidenceProvider, MotionMask};
pub use geometry::{BoundingBox, Point, Resolution, Zone};
pub use ingest::{EndOfStream, FileConfig, FileSource, FrameSource};
pub use pipeline::{FrameOutcome, OccupancyPipeline};
pub use status::{StatusSnapshot, StatusTracker};
