pub mod landmark;
pub mod source;

pub use landmark::{DetectionFrame, HandDetection, Handedness, Landmark, LANDMARK_COUNT};
pub use source::{parse_recording, FrameSource, RecordedFrame, ReplaySource, UnavailableSource};
