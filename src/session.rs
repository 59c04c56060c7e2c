//! Per-frame processing and caller-owned sessions.
//!
//! - `FrameEngine::process` is the pure per-frame contract: frame, regions,
//!   detections and the previous state in; annotated frame, next state and
//!   counts out.
//! - `Session` owns one stream's region cache and occupancy state between
//!   `start` and `finish`. Sessions share nothing; two cameras get two sessions.
//! - `Pipeline` couples a detector backend with a session and applies the
//!   detector failure policy.

use anyhow::Result;
use image::RgbImage;
use serde::Serialize;
use std::time::Instant;

use crate::annotate::Annotator;
use crate::detect::{DetectOptions, Detection, DetectorBackend};
use crate::frame::Frame;
use crate::matcher::{match_detections, unmatched, MatchResult};
use crate::regions::{RegionCache, RegionSet};
use crate::tracker::{self, OccupancyMap, OccupancyState, OccupancySummary, OccupancyTracker};

// -------------------- Frame engine --------------------

/// Matcher, tracker policy and annotator bundled for one configuration.
pub struct FrameEngine {
    filter: DetectOptions,
    hold_frames: u64,
    annotator: Annotator,
}

/// Output of one `FrameEngine::process` call.
pub struct ProcessedFrame {
    pub annotated: RgbImage,
    pub state: OccupancyMap,
    pub matches: MatchResult,
    pub occupied: usize,
    pub free: usize,
    /// Detections that passed the eligibility filter.
    pub eligible: usize,
    /// Eligible detections whose centers fall in no region.
    pub unmatched: usize,
}

impl FrameEngine {
    pub fn new(filter: DetectOptions, annotator: Annotator) -> Self {
        Self {
            filter,
            hold_frames: 0,
            annotator,
        }
    }

    pub fn with_hold_frames(mut self, hold_frames: u64) -> Self {
        self.hold_frames = hold_frames;
        self
    }

    pub fn hold_frames(&self) -> u64 {
        self.hold_frames
    }

    /// Run matcher, tracker and annotator for one frame.
    ///
    /// Detections failing the eligibility filter are ignored. The caller's
    /// frame and state are not modified.
    pub fn process(
        &self,
        frame: &RgbImage,
        regions: &RegionSet,
        detections: &[Detection],
        state: &OccupancyMap,
        frame_index: u64,
    ) -> ProcessedFrame {
        let eligible = self.filter.filter(detections);
        let matches = match_detections(regions, &eligible);
        let stray = unmatched(regions, &eligible).len();
        let state = tracker::update(state, &matches, frame_index, self.hold_frames);
        let annotated = self.annotator.render(frame, regions, &state, &eligible);
        let summary = OccupancySummary::of(&state);
        ProcessedFrame {
            annotated,
            state,
            matches,
            occupied: summary.occupied,
            free: summary.free,
            eligible: eligible.len(),
            unmatched: stray,
        }
    }
}

// -------------------- Session --------------------

/// Serializable per-frame summary, one JSON line per frame in the CLI.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameSummary {
    pub frame: u64,
    pub total: usize,
    pub occupied: usize,
    pub free: usize,
    pub occupied_ids: Vec<String>,
    pub detections: usize,
    pub unmatched: usize,
    pub regions_fingerprint: String,
}

pub struct FrameOutcome {
    pub annotated: RgbImage,
    pub summary: FrameSummary,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionReport {
    pub frames: u64,
    pub region_reloads: u64,
    pub last: Option<FrameSummary>,
    pub elapsed_ms: u128,
}

/// One stream's regions and occupancy state.
pub struct Session {
    engine: FrameEngine,
    regions: RegionCache,
    tracker: OccupancyTracker,
    frames: u64,
    last: Option<FrameSummary>,
    started: Instant,
}

impl Session {
    /// Begin a stream; every region starts free.
    pub fn start(engine: FrameEngine, regions: RegionCache) -> Self {
        let tracker = OccupancyTracker::new();
        log::info!(
            "session started (cache={:?}, hold_frames={})",
            regions.policy(),
            engine.hold_frames()
        );
        Self {
            engine,
            regions,
            tracker,
            frames: 0,
            last: None,
            started: Instant::now(),
        }
    }

    /// Process one frame with the detections already produced for it.
    ///
    /// Fails only when the region set cannot be loaded.
    pub fn process(&mut self, frame: &Frame, detections: &[Detection]) -> Result<FrameOutcome> {
        let regions = self.regions.current()?;
        let processed = self.engine.process(
            frame.image(),
            regions,
            detections,
            self.tracker.states(),
            frame.index(),
        );
        let counts = self.tracker.commit(processed.state);

        let summary = FrameSummary {
            frame: frame.index(),
            total: counts.total,
            occupied: counts.occupied,
            free: counts.free,
            occupied_ids: self.tracker.occupied_ids(),
            detections: processed.eligible,
            unmatched: processed.unmatched,
            regions_fingerprint: self.regions.fingerprint().unwrap_or_default().to_string(),
        };
        log::debug!(
            "frame {}: {} occupied, {} free, {} eligible detections",
            summary.frame,
            summary.occupied,
            summary.free,
            summary.detections
        );
        self.frames += 1;
        self.last = Some(summary.clone());
        Ok(FrameOutcome {
            annotated: processed.annotated,
            summary,
        })
    }

    /// Signal an external region edit; the next frame re-reads the document.
    pub fn regions_changed(&mut self) {
        self.regions.invalidate();
    }

    pub fn state(&self) -> &OccupancyMap {
        self.tracker.states()
    }

    pub fn region_state(&self, region_id: &str) -> Option<&OccupancyState> {
        self.tracker.get(region_id)
    }

    pub fn summary(&self) -> OccupancySummary {
        self.tracker.summary()
    }

    /// End the stream and discard its state.
    pub fn finish(mut self) -> SessionReport {
        self.tracker.reset();
        let report = SessionReport {
            frames: self.frames,
            region_reloads: self.regions.reloads(),
            last: self.last,
            elapsed_ms: self.started.elapsed().as_millis(),
        };
        log::info!(
            "session finished: {} frames, {} region reloads, {} ms",
            report.frames,
            report.region_reloads,
            report.elapsed_ms
        );
        report
    }
}

// -------------------- Pipeline --------------------

/// Detector followed by the session, frame at a time.
pub struct Pipeline {
    detector: Box<dyn DetectorBackend>,
    options: DetectOptions,
    session: Session,
    detector_failures: u64,
}

impl Pipeline {
    pub fn new(
        mut detector: Box<dyn DetectorBackend>,
        options: DetectOptions,
        session: Session,
    ) -> Result<Self> {
        detector.reset();
        detector.warm_up()?;
        log::info!("pipeline using detector backend '{}'", detector.name());
        Ok(Self {
            detector,
            options,
            session,
            detector_failures: 0,
        })
    }

    /// Detect then process one frame.
    ///
    /// A detector error is logged and the frame is processed as having no
    /// detections, so every region reads free for that frame.
    pub fn step(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        let detections = match self.detector.detect(frame, &self.options) {
            Ok(detections) => detections,
            Err(err) => {
                self.detector_failures += 1;
                log::warn!(
                    "detector '{}' failed on frame {}: {:#}; treating as no detections",
                    self.detector.name(),
                    frame.index(),
                    err
                );
                Vec::new()
            }
        };
        if !self.options.persist {
            self.detector.reset();
        }
        self.session.process(frame, &detections)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn detector_failures(&self) -> u64 {
        self.detector_failures
    }

    pub fn finish(self) -> SessionReport {
        if self.detector_failures > 0 {
            log::warn!("{} frames had detector failures", self.detector_failures);
        }
        self.session.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::AnnotateOptions;
    use crate::detect::StubBackend;
    use crate::geometry::{BoundingBox, Point};
    use crate::regions::Region;

    fn lot() -> RegionSet {
        RegionSet::from_regions([
            Region::from_rect("A", None, Point::new(0.0, 0.0), Point::new(10.0, 10.0)).unwrap(),
            Region::from_rect("B", None, Point::new(20.0, 0.0), Point::new(30.0, 10.0)).unwrap(),
        ])
        .unwrap()
    }

    fn engine() -> FrameEngine {
        FrameEngine::new(DetectOptions::default(), Annotator::new(AnnotateOptions::default()))
    }

    fn car() -> Detection {
        Detection::new(BoundingBox::new(2.0, 2.0, 6.0, 6.0), 3, 0.9).with_track_id(1)
    }

    #[test]
    fn process_leaves_inputs_untouched() {
        let frame = RgbImage::new(40, 20);
        let state = OccupancyMap::new();
        let out = engine().process(&frame, &lot(), &[car()], &state, 0);
        assert_eq!((out.occupied, out.free), (1, 1));
        assert!(state.is_empty());
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0]));
        assert_ne!(out.annotated, frame);
    }

    #[test]
    fn ineligible_detections_are_ignored() {
        let person = Detection::new(BoundingBox::new(2.0, 2.0, 6.0, 6.0), 0, 0.99);
        let faint = Detection::new(BoundingBox::new(22.0, 2.0, 26.0, 6.0), 3, 0.1);
        let out = engine().process(&RgbImage::new(40, 20), &lot(), &[person, faint], &OccupancyMap::new(), 0);
        assert_eq!(out.occupied, 0);
    }

    #[test]
    fn session_matches_engine_and_reuses_cached_fingerprint() {
        let regions = lot();
        let expected = regions.fingerprint();
        let stray = Detection::new(BoundingBox::new(12.0, 2.0, 16.0, 6.0), 3, 0.9);
        let dets = [car(), stray];
        let direct = engine().process(&RgbImage::new(40, 20), &regions, &dets, &OccupancyMap::new(), 0);

        let mut session = Session::start(engine(), RegionCache::fixed(regions));
        let outcome = session.process(&Frame::blank(0, 40, 20), &dets).unwrap();

        assert_eq!(outcome.annotated, direct.annotated);
        assert_eq!(session.state(), &direct.state);
        assert_eq!(outcome.summary.regions_fingerprint, expected);
        assert_eq!(outcome.summary.detections, 2);
        assert_eq!(outcome.summary.unmatched, 1);
        assert_eq!(direct.unmatched, 1);
    }

    #[test]
    fn pipeline_treats_detector_failure_as_empty() {
        let stub = StubBackend::new().with_frame(0, vec![car()]).with_frame(1, vec![car()]).fail_on(1);
        let session = Session::start(engine(), RegionCache::fixed(lot()));
        let mut pipeline = Pipeline::new(Box::new(stub), DetectOptions::default(), session).unwrap();

        let first = pipeline.step(&Frame::blank(0, 40, 20)).unwrap();
        assert_eq!(first.summary.occupied_ids, vec!["A".to_string()]);

        let second = pipeline.step(&Frame::blank(1, 40, 20)).unwrap();
        assert_eq!(second.summary.occupied, 0);
        assert_eq!(second.summary.free, 2);
        assert_eq!(pipeline.detector_failures(), 1);

        let report = pipeline.finish();
        assert_eq!(report.frames, 2);
        assert_eq!(report.last.unwrap().frame, 1);
    }
}
