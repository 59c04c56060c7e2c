//! Region ↔ detection association.
//!
//! A detection occupies a region when the center of its box lies inside the
//! region polygon (boundary inclusive). When several centers fall inside one
//! region the winner is chosen by `rank`, which is a total order, so the
//! result never depends on the order detections arrive in.
//!
//! Matching is pure: no state, no I/O, same inputs give the same mapping.
//! A detection may occupy more than one region when regions overlap.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::detect::Detection;
use crate::regions::RegionSet;

/// Region id → winning detection, one entry per region in the set.
pub type MatchResult = BTreeMap<String, Option<Detection>>;

/// Order two candidates for the same region; `Less` means `a` wins.
///
/// 1. higher confidence
/// 2. lower tracking identity; a tracked detection beats an untracked one
/// 3. smaller box (x1, y1, x2, y2), then smaller class id
pub fn rank(a: &Detection, b: &Detection) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| match (a.track_id, b.track_id) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.bbox.x1.total_cmp(&b.bbox.x1))
        .then_with(|| a.bbox.y1.total_cmp(&b.bbox.y1))
        .then_with(|| a.bbox.x2.total_cmp(&b.bbox.x2))
        .then_with(|| a.bbox.y2.total_cmp(&b.bbox.y2))
        .then_with(|| a.class_id.cmp(&b.class_id))
}

/// Associate each region with the best detection whose center it contains.
pub fn match_detections(regions: &RegionSet, detections: &[Detection]) -> MatchResult {
    regions
        .iter()
        .map(|region| {
            let winner = detections
                .iter()
                .filter(|d| region.contains(d.center()))
                .min_by(|a, b| rank(a, b))
                .cloned();
            (region.id().to_string(), winner)
        })
        .collect()
}

/// Detections whose centers fall in no region.
pub fn unmatched<'a>(regions: &RegionSet, detections: &'a [Detection]) -> Vec<&'a Detection> {
    detections
        .iter()
        .filter(|d| {
            let c = d.center();
            !regions.iter().any(|r| r.contains(c))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Point};
    use crate::regions::Region;

    fn lot() -> RegionSet {
        RegionSet::from_regions([
            Region::from_rect("A", None, Point::new(0.0, 0.0), Point::new(10.0, 10.0)).unwrap(),
            Region::from_rect("B", None, Point::new(20.0, 0.0), Point::new(30.0, 10.0)).unwrap(),
        ])
        .unwrap()
    }

    fn det(bbox: [f64; 4], confidence: f32, track: Option<u64>) -> Detection {
        Detection {
            bbox: BoundingBox::from(bbox),
            class_id: 3,
            confidence,
            track_id: track,
        }
    }

    #[test]
    fn center_inside_occupies_region() {
        let result = match_detections(&lot(), &[det([2.0, 2.0, 6.0, 6.0], 0.9, Some(1))]);
        assert_eq!(result["A"].as_ref().unwrap().track_id, Some(1));
        assert!(result["B"].is_none());
    }

    #[test]
    fn box_overlapping_but_center_outside_does_not_occupy() {
        // Box spans into A but its center (14, 5) is between the slots.
        let result = match_detections(&lot(), &[det([8.0, 0.0, 20.0, 10.0], 0.9, None)]);
        assert!(result.values().all(Option::is_none));
    }

    #[test]
    fn center_on_boundary_occupies() {
        let result = match_detections(&lot(), &[det([8.0, 4.0, 12.0, 6.0], 0.8, None)]);
        assert!(result["A"].is_some());
    }

    #[test]
    fn highest_confidence_wins_regardless_of_order() {
        let low = det([1.0, 1.0, 5.0, 5.0], 0.7, Some(1));
        let high = det([4.0, 4.0, 8.0, 8.0], 0.95, Some(2));
        for input in [vec![low.clone(), high.clone()], vec![high.clone(), low.clone()]] {
            let result = match_detections(&lot(), &input);
            assert_eq!(result["A"].as_ref(), Some(&high));
        }
    }

    #[test]
    fn equal_confidence_prefers_lower_track_id() {
        let seven = det([1.0, 1.0, 5.0, 5.0], 0.8, Some(7));
        let three = det([4.0, 4.0, 8.0, 8.0], 0.8, Some(3));
        let untracked = det([2.0, 2.0, 6.0, 6.0], 0.8, None);
        for input in [
            vec![seven.clone(), three.clone(), untracked.clone()],
            vec![untracked.clone(), three.clone(), seven.clone()],
        ] {
            let result = match_detections(&lot(), &input);
            assert_eq!(result["A"].as_ref().unwrap().track_id, Some(3));
        }
    }

    #[test]
    fn empty_detections_leave_all_unoccupied() {
        let result = match_detections(&lot(), &[]);
        assert_eq!(result.len(), 2);
        assert!(result.values().all(Option::is_none));
    }

    #[test]
    fn unmatched_lists_stray_detections() {
        let inside = det([2.0, 2.0, 6.0, 6.0], 0.9, None);
        let stray = det([40.0, 40.0, 50.0, 50.0], 0.9, None);
        let dets = [inside, stray.clone()];
        assert_eq!(unmatched(&lot(), &dets), vec![&stray]);
    }
}
