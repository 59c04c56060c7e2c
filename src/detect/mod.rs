//! Detector capability.
//!
//! The detector model is an external collaborator. The engine only sees the
//! `DetectorBackend` trait; this crate ships two backends that need no model:
//! - `ReplayBackend`: detections recorded to a JSON-lines file
//! - `StubBackend`: scripted detections for tests and demos

mod backend;
mod backends;
mod result;

pub use backend::{
    DetectOptions, DetectorBackend, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_VEHICLE_CLASSES,
};
pub use backends::{ReplayBackend, StubBackend};
pub use result::{Detection, FrameDetections};
