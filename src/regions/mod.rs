//! Parking-slot regions.
//!
//! - `Region`: one validated slot polygon (id, optional label, ≥3 vertices)
//! - `RegionSet`: ordered id → region mapping, the unit of persistence
//! - `store`: JSON document load/save with atomic replace
//! - `cache`: per-session reload policy for a persisted set
//!
//! A `Region` can only be built through validation, so every polygon that
//! reaches the matcher or the annotator is simple and non-degenerate.

use anyhow::Result;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::geometry::{self, BoundingBox, Point, EPSILON};

pub mod cache;
pub mod store;

pub use cache::{CachePolicy, RegionCache};
pub use store::{load, save, RegionStore};

// -------------------- Errors --------------------

/// Failure at the region-store boundary.
///
/// Carried inside `anyhow::Error`; callers that need to distinguish the cases
/// use `err.downcast_ref::<RegionError>()`.
#[derive(Debug)]
pub enum RegionError {
    /// The document is not valid JSON or does not have the region shape.
    Parse(String),
    /// The document parsed but a region is geometrically or lexically invalid.
    Validation(String),
    /// Reading or replacing the persisted document failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RegionError {
    pub fn code(&self) -> &'static str {
        match self {
            RegionError::Parse(_) => "REGION_PARSE",
            RegionError::Validation(_) => "REGION_VALIDATION",
            RegionError::Io { .. } => "REGION_IO",
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, RegionError::Parse(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RegionError::Validation(_))
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::Parse(msg) | RegionError::Validation(msg) => {
                write!(f, "{}: {}", self.code(), msg)
            }
            RegionError::Io { path, source } => {
                write!(f, "{}: {}: {}", self.code(), path.display(), source)
            }
        }
    }
}

impl std::error::Error for RegionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegionError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn invalid<T>(msg: String) -> Result<T> {
    Err(RegionError::Validation(msg).into())
}

// -------------------- Region --------------------

/// Region ids are local slot names, not free text.
///
/// Allowed: "A", "slot-12", "lot_b:07"
pub fn validate_region_id(id: &str) -> Result<()> {
    static REGION_ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = REGION_ID_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.:-]{1,64}$").expect("static region id pattern")
    });
    if !re.is_match(id) {
        return invalid(format!(
            "region id {:?} must match ^[A-Za-z0-9_.:-]{{1,64}}$",
            id
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    id: String,
    label: Option<String>,
    points: Vec<Point>,
    bounds: BoundingBox,
}

impl Region {
    /// Build a region, rejecting anything the matcher could not handle:
    /// fewer than 3 vertices, non-finite coordinates, repeated consecutive
    /// vertices, zero area, or self-intersection.
    pub fn new(id: impl Into<String>, label: Option<String>, points: Vec<Point>) -> Result<Self> {
        let id = id.into();
        validate_region_id(&id)?;

        if points.len() < 3 {
            return invalid(format!(
                "region {} has {} vertices (need at least 3)",
                id,
                points.len()
            ));
        }
        if let Some(p) = points.iter().find(|p| !p.is_finite()) {
            return invalid(format!("region {} has non-finite vertex {:?}", id, p));
        }
        let n = points.len();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            if (a.x - b.x).abs() <= EPSILON && (a.y - b.y).abs() <= EPSILON {
                return invalid(format!("region {} repeats vertex {:?}", id, a));
            }
        }
        if geometry::signed_area(&points).abs() <= EPSILON {
            return invalid(format!("region {} is degenerate (zero area)", id));
        }
        if !geometry::polygon_is_simple(&points) {
            return invalid(format!("region {} self-intersects", id));
        }

        let bounds = BoundingBox::enclosing(&points)
            .ok_or_else(|| RegionError::Validation(format!("region {} has no vertices", id)))?;

        Ok(Self {
            id,
            label: label.filter(|l| !l.trim().is_empty()),
            points,
            bounds,
        })
    }

    /// Axis-aligned rectangle from two opposite corners, wound the way the
    /// point-selection tool wrote them: (x0,y0) (x0,y1) (x1,y1) (x1,y0).
    pub fn from_rect(
        id: impl Into<String>,
        label: Option<String>,
        corner_a: Point,
        corner_b: Point,
    ) -> Result<Self> {
        let points = vec![
            Point::new(corner_a.x, corner_a.y),
            Point::new(corner_a.x, corner_b.y),
            Point::new(corner_b.x, corner_b.y),
            Point::new(corner_b.x, corner_a.y),
        ];
        Self::new(id, label, points)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Inclusive point-in-polygon with a bounding-box fast reject.
    pub fn contains(&self, p: Point) -> bool {
        self.bounds.contains(p) && geometry::point_in_polygon(p, &self.points)
    }

    pub fn centroid(&self) -> Point {
        // Non-empty by construction.
        geometry::centroid(&self.points).unwrap_or(Point::new(self.bounds.x1, self.bounds.y1))
    }
}

// -------------------- RegionSet --------------------

/// Ordered mapping from region id to region. Iteration is by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionSet {
    regions: BTreeMap<String, Region>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from regions, rejecting duplicate ids.
    pub fn from_regions(regions: impl IntoIterator<Item = Region>) -> Result<Self> {
        let mut set = Self::new();
        for region in regions {
            set.insert(region)?;
        }
        Ok(set)
    }

    /// Add a region. Fails if the id is already taken.
    pub fn insert(&mut self, region: Region) -> Result<()> {
        if self.regions.contains_key(region.id()) {
            return invalid(format!("duplicate region id {}", region.id()));
        }
        self.regions.insert(region.id().to_string(), region);
        Ok(())
    }

    /// Add or replace a region, returning the previous definition.
    pub fn upsert(&mut self, region: Region) -> Option<Region> {
        self.regions.insert(region.id().to_string(), region)
    }

    pub fn remove(&mut self, id: &str) -> Option<Region> {
        self.regions.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.regions.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Hex SHA-256 of the canonical document. Equal sets have equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let doc = store::encode_document(self);
        hex::encode(Sha256::digest(doc.as_bytes()))
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::collections::btree_map::Values<'a, String, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().map(|&p| Point::from(p)).collect()
    }

    fn validation(err: anyhow::Error) -> bool {
        err.downcast_ref::<RegionError>()
            .is_some_and(RegionError::is_validation)
    }

    #[test]
    fn rejects_two_point_region() {
        let err = Region::new("A", None, pts(&[(0.0, 0.0), (1.0, 1.0)])).unwrap_err();
        assert!(validation(err));
    }

    #[test]
    fn rejects_self_intersecting_region() {
        let err = Region::new(
            "A",
            None,
            pts(&[(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]),
        )
        .unwrap_err();
        assert!(validation(err));
    }

    #[test]
    fn rejects_collinear_and_repeated_vertices() {
        assert!(Region::new("A", None, pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)])).is_err());
        assert!(Region::new(
            "A",
            None,
            pts(&[(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0)])
        )
        .is_err());
        assert!(Region::new("A", None, pts(&[(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)])).is_err());
    }

    #[test]
    fn rejects_bad_ids() {
        let square = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!(Region::new("", None, square.clone()).is_err());
        assert!(Region::new("has space", None, square.clone()).is_err());
        assert!(Region::new("lot_b:07", None, square).is_ok());
    }

    #[test]
    fn from_rect_matches_selection_tool_winding() {
        let r = Region::from_rect("A", None, Point::new(0.0, 0.0), Point::new(10.0, 5.0)).unwrap();
        assert_eq!(
            r.points(),
            &pts(&[(0.0, 0.0), (0.0, 5.0), (10.0, 5.0), (10.0, 0.0)])[..]
        );
        assert!(r.contains(Point::new(10.0, 5.0)));
    }

    #[test]
    fn set_rejects_duplicate_ids_and_orders_by_id() {
        let mk = |id: &str| {
            Region::from_rect(id, None, Point::new(0.0, 0.0), Point::new(1.0, 1.0)).unwrap()
        };
        let mut set = RegionSet::from_regions([mk("b"), mk("a")]).unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(validation(set.insert(mk("a")).unwrap_err()));
        assert!(set.upsert(mk("a")).is_some());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Region::from_rect("A", None, Point::new(0.0, 0.0), Point::new(1.0, 1.0)).unwrap();
        let b = Region::from_rect("B", None, Point::new(2.0, 0.0), Point::new(3.0, 1.0)).unwrap();
        let one = RegionSet::from_regions([a.clone()]).unwrap();
        let same = RegionSet::from_regions([a.clone()]).unwrap();
        let two = RegionSet::from_regions([a, b]).unwrap();
        assert_eq!(one.fingerprint(), same.fingerprint());
        assert_ne!(one.fingerprint(), two.fingerprint());
    }
}
