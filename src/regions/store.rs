//! Region document persistence.
//!
//! The document is human-editable JSON:
//!
//! ```json
//! {"regions": [{"id": "A", "label": "row 1", "points": [[0, 0], [10, 0], [10, 10]]}]}
//! ```
//!
//! Documents written by the legacy point-selection tool (a bare array of
//! `{"points": [...]}` objects) are still accepted on load; they are assigned
//! ids `slot-1`, `slot-2`, … in document order. `save` always writes the
//! canonical form.
//!
//! `save` writes to a uniquely named temporary file beside the target and
//! renames it into place, so readers observe either the previous or the new
//! document and concurrent writers never interleave.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Region, RegionError, RegionSet};
use crate::geometry::Point;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionDocument {
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionEntry {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    points: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    points: Vec<Point>,
}

/// Handle on one persisted region document.
#[derive(Clone, Debug)]
pub struct RegionStore {
    path: PathBuf,
}

impl RegionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<RegionSet> {
        load(&self.path)
    }

    pub fn save(&self, set: &RegionSet) -> Result<()> {
        save(&self.path, set)
    }

    /// Load, apply `edit`, save. Missing documents start from an empty set.
    pub fn update<F>(&self, edit: F) -> Result<RegionSet>
    where
        F: FnOnce(&mut RegionSet) -> Result<()>,
    {
        let mut set = if self.path.exists() {
            self.load()?
        } else {
            RegionSet::new()
        };
        edit(&mut set)?;
        self.save(&set)?;
        Ok(set)
    }
}

/// Read and validate a region document. No partial set is ever returned.
pub fn load(path: &Path) -> Result<RegionSet> {
    let raw = fs::read_to_string(path).map_err(|source| RegionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let set = decode_document(&raw)?;
    log::debug!("loaded {} regions from {}", set.len(), path.display());
    Ok(set)
}

/// Atomically replace the document at `path` with `set`.
pub fn save(path: &Path, set: &RegionSet) -> Result<()> {
    let encoded = encode_document(set);
    write_atomic(path, encoded.as_bytes()).map_err(|source| RegionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("saved {} regions to {}", set.len(), path.display());
    Ok(())
}

/// Parse a document from text. Structural problems are `Parse`, geometric
/// ones `Validation`.
pub fn decode_document(raw: &str) -> Result<RegionSet> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| RegionError::Parse(format!("invalid region document: {}", e)))?;

    let mut set = RegionSet::new();
    if value.is_array() {
        let entries: Vec<LegacyEntry> = serde_json::from_value(value)
            .map_err(|e| RegionError::Parse(format!("invalid legacy region list: {}", e)))?;
        for (idx, entry) in entries.into_iter().enumerate() {
            let id = format!("slot-{}", idx + 1);
            let region = if entry.points.len() == 2 {
                Region::from_rect(id, None, entry.points[0], entry.points[1])?
            } else {
                Region::new(id, None, entry.points)?
            };
            set.insert(region)?;
        }
    } else {
        let doc: RegionDocument = serde_json::from_value(value)
            .map_err(|e| RegionError::Parse(format!("invalid region document: {}", e)))?;
        for entry in doc.regions {
            set.insert(Region::new(entry.id, entry.label, entry.points)?)?;
        }
    }
    Ok(set)
}

/// Canonical pretty-printed document. Regions appear in id order.
pub fn encode_document(set: &RegionSet) -> String {
    let doc = RegionDocument {
        regions: set
            .iter()
            .map(|r| RegionEntry {
                id: r.id().to_string(),
                label: r.label().map(str::to_string),
                points: r.points().to_vec(),
            })
            .collect(),
    };
    // Plain structs of strings and finite floats always serialize.
    let mut out = serde_json::to_string_pretty(&doc).unwrap_or_default();
    out.push('\n');
    out
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".regions-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
