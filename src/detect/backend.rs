use anyhow::Result;
use std::collections::BTreeSet;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Vehicle class ids of the parking-lot detection model.
pub const DEFAULT_VEHICLE_CLASSES: &[u32] = &[3, 4, 5, 8, 9];

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Options passed to the detector on every call and reused by the matcher's
/// eligibility filter.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectOptions {
    /// Detections scoring below this are dropped before matching.
    pub confidence_threshold: f32,
    /// Keep tracker state across frames (stable track ids).
    pub persist: bool,
    /// Eligible class ids. Empty admits every class.
    pub class_filter: BTreeSet<u32>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            persist: true,
            class_filter: DEFAULT_VEHICLE_CLASSES.iter().copied().collect(),
        }
    }
}

impl DetectOptions {
    /// Admit everything with a positive score.
    pub fn permissive() -> Self {
        Self {
            confidence_threshold: 0.0,
            persist: true,
            class_filter: BTreeSet::new(),
        }
    }

    pub fn admits(&self, detection: &Detection) -> bool {
        detection.confidence >= self.confidence_threshold
            && (self.class_filter.is_empty() || self.class_filter.contains(&detection.class_id))
    }

    /// Eligible detections, input order preserved.
    pub fn filter(&self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| self.admits(d))
            .cloned()
            .collect()
    }
}

/// Detector capability.
///
/// The engine treats the detector as opaque: given a frame it returns zero or
/// more detections. Implementations must be deterministic for the same frame
/// and internal tracker state, must treat the frame as read-only, and may
/// return an empty list. Errors are reported but never fatal to a stream; the
/// pipeline treats a failed call as "nothing seen".
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame, options: &DetectOptions) -> Result<Vec<Detection>>;

    /// Drop tracker state. Called at session start and, when `persist` is
    /// off, after every frame.
    fn reset(&mut self) {}

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
