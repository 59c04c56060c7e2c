//! Parking occupancy kernel.
//!
//! Determines, frame by frame, which slots of a parking lot are occupied by
//! matching vehicle detections against user-defined polygonal regions.
//!
//! # Architecture
//!
//! Leaves first:
//!
//! 1. **Region Store** (`regions`): validated polygons persisted as one JSON
//!    document with atomic replace; `regions::cache` decides when to re-read it.
//! 2. **Geometry Matcher** (`matcher`): region ↔ detection association by box
//!    center, with a total tie-break order.
//! 3. **Occupancy State Tracker** (`tracker`): per-region occupied flag and
//!    occupant identity across frames.
//! 4. **Annotator** (`annotate`): outlines colored by occupancy, optional
//!    labels and an analytics panel.
//! 5. **Session / Pipeline** (`session`): the per-frame contract, caller-owned
//!    stream state and the detector failure policy.
//!
//! The detector model is external (`detect::DetectorBackend`). Frames come
//! from `ingest` already decoded.
//!
//! # Module Structure
//!
//! - `geometry`: points, boxes, point-in-polygon, polygon validity
//! - `frame`: decoded frames
//! - `config`: engine configuration from file and environment
//! - `ui`: CLI progress output

pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod matcher;
pub mod regions;
pub mod session;
pub mod tracker;
pub mod ui;

pub use annotate::{AnnotateOptions, Annotator};
pub use config::EngineConfig;
pub use detect::{DetectOptions, Detection, DetectorBackend, ReplayBackend, StubBackend};
pub use frame::Frame;
pub use geometry::{BoundingBox, Point};
pub use ingest::{FileConfig, FileSource};
pub use matcher::{match_detections, MatchResult};
pub use regions::{CachePolicy, Region, RegionCache, RegionError, RegionSet, RegionStore};
pub use session::{FrameEngine, FrameOutcome, FrameSummary, Pipeline, ProcessedFrame, Session};
pub use tracker::{OccupancyMap, OccupancyState, OccupancySummary, OccupancyTracker};
