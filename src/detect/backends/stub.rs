use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

use crate::detect::backend::{DetectOptions, DetectorBackend};
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Scripted backend for tests and demos.
///
/// Returns the detections scripted for a frame index (nothing for unscripted
/// frames), filtered by the call's options. Frames marked with `fail_on`
/// return an error instead, to exercise the pipeline's failure policy.
#[derive(Default)]
pub struct StubBackend {
    script: BTreeMap<u64, Vec<Detection>>,
    failing: Vec<u64>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, frame: u64, detections: Vec<Detection>) -> Self {
        self.script.insert(frame, detections);
        self
    }

    pub fn fail_on(mut self, frame: u64) -> Self {
        self.failing.push(frame);
        self
    }

    /// Number of `detect` calls served.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, options: &DetectOptions) -> Result<Vec<Detection>> {
        self.calls += 1;
        if self.failing.contains(&frame.index()) {
            return Err(anyhow!("stub detector failure at frame {}", frame.index()));
        }
        Ok(self
            .script
            .get(&frame.index())
            .map(|dets| options.filter(dets))
            .unwrap_or_default())
    }
}
