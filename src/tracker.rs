//! Per-region occupancy across a stream.
//!
//! Base contract: occupancy follows the latest frame's match result with no
//! debounce. A region flips to free on the first frame its occupant is not
//! matched, so a single missed detection shows as flicker.
//!
//! `hold_frames` is an opt-in extension: an unmatched region stays occupied
//! by its last occupant while `frame_index - last_seen_frame <= hold_frames`.
//! The window is computed from stored frame indices only, so `update` with the
//! same match result and frame index is idempotent with or without a hold.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::matcher::MatchResult;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OccupancyState {
    pub occupied: bool,
    /// Tracking identity of the occupant, when the detector supplied one.
    pub track_id: Option<u64>,
    pub class_id: Option<u32>,
    pub confidence: Option<f32>,
    /// Frame index of the update that produced this state.
    pub last_updated_frame: u64,
    /// Last frame index at which a detection was matched to the region.
    pub last_seen_frame: Option<u64>,
}

/// Region id → occupancy. Owned by exactly one session.
pub type OccupancyMap = BTreeMap<String, OccupancyState>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OccupancySummary {
    pub total: usize,
    pub occupied: usize,
    pub free: usize,
}

impl OccupancySummary {
    pub fn of(states: &OccupancyMap) -> Self {
        let total = states.len();
        let occupied = states.values().filter(|s| s.occupied).count();
        Self {
            total,
            occupied,
            free: total - occupied,
        }
    }
}

/// Apply one frame's match result to `previous`, returning the new state.
///
/// The result covers exactly the regions present in `matches`: regions that
/// disappeared from the set are dropped, new regions start from free.
pub fn update(
    previous: &OccupancyMap,
    matches: &MatchResult,
    frame_index: u64,
    hold_frames: u64,
) -> OccupancyMap {
    matches
        .iter()
        .map(|(id, matched)| {
            let prev = previous.get(id);
            let next = match matched {
                Some(det) => OccupancyState {
                    occupied: true,
                    track_id: det.track_id,
                    class_id: Some(det.class_id),
                    confidence: Some(det.confidence),
                    last_updated_frame: frame_index,
                    last_seen_frame: Some(frame_index),
                },
                None => {
                    let last_seen = prev.and_then(|p| p.last_seen_frame);
                    let held = hold_frames > 0
                        && prev.is_some_and(|p| p.occupied)
                        && last_seen.is_some_and(|seen| frame_index.saturating_sub(seen) <= hold_frames);
                    match prev {
                        Some(p) if held => OccupancyState {
                            last_updated_frame: frame_index,
                            ..p.clone()
                        },
                        _ => OccupancyState {
                            occupied: false,
                            track_id: None,
                            class_id: None,
                            confidence: None,
                            last_updated_frame: frame_index,
                            last_seen_frame: last_seen,
                        },
                    }
                }
            };
            (id.clone(), next)
        })
        .collect()
}

/// Session-owned occupancy state.
///
/// Holds the map produced by the latest `update` between frames; the
/// per-frame computation itself is the pure `update` above.
#[derive(Clone, Debug, Default)]
pub struct OccupancyTracker {
    states: OccupancyMap,
}

impl OccupancyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored state with the result of the latest frame.
    pub fn commit(&mut self, states: OccupancyMap) -> OccupancySummary {
        self.states = states;
        self.summary()
    }

    pub fn states(&self) -> &OccupancyMap {
        &self.states
    }

    pub fn get(&self, region_id: &str) -> Option<&OccupancyState> {
        self.states.get(region_id)
    }

    pub fn summary(&self) -> OccupancySummary {
        OccupancySummary::of(&self.states)
    }

    pub fn occupied_ids(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|(_, s)| s.occupied)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Forget everything (stream end or restart).
    pub fn reset(&mut self) {
        self.states.clear();
    }
}
