pub mod background;
pub mod replay;

pub use background::BackgroundSubtractor;
pub use replay::DetectionReplay;
