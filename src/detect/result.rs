use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// One object observation for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Corner-form box (x1, y1, x2, y2) in frame pixels.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub class_id: u32,
    /// Detector score in [0, 1].
    pub confidence: f32,
    /// Tracker identity, stable across frames while the tracker keeps the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
            track_id: None,
        }
    }

    pub fn with_track_id(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// Detections recorded for one frame (replay files, scripted backends).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}
