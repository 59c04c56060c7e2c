//! Replays detections recorded by an external detector.
//!
//! The file holds one JSON object per line:
//!
//! ```text
//! {"frame": 0, "detections": [{"box": [2, 2, 6, 6], "class_id": 3, "confidence": 0.9, "track_id": 1}]}
//! ```
//!
//! Blank lines are skipped. Frames with no line yield no detections. A frame
//! listed twice is rejected rather than silently merged.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::detect::backend::{DetectOptions, DetectorBackend};
use crate::detect::result::{Detection, FrameDetections};
use crate::frame::Frame;

pub struct ReplayBackend {
    frames: BTreeMap<u64, Vec<Detection>>,
}

impl ReplayBackend {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read detections file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid detections file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut frames = BTreeMap::new();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: FrameDetections = serde_json::from_str(line)
                .map_err(|e| anyhow!("line {}: {}", lineno + 1, e))?;
            if frames.insert(entry.frame, entry.detections).is_some() {
                return Err(anyhow!("line {}: frame {} listed twice", lineno + 1, entry.frame));
            }
        }
        log::debug!("replay backend loaded {} frames", frames.len());
        Ok(Self { frames })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Highest frame index with recorded detections.
    pub fn last_frame(&self) -> Option<u64> {
        self.frames.keys().next_back().copied()
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, frame: &Frame, options: &DetectOptions) -> Result<Vec<Detection>> {
        Ok(self
            .frames
            .get(&frame.index())
            .map(|dets| options.filter(dets))
            .unwrap_or_default())
    }
}
