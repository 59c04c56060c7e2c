//! Region caching between frames.
//!
//! The streaming loop needs the current region set once per frame. Two
//! policies are supported:
//!
//! - `ReloadEveryFrame`: re-read the document on every call (always fresh).
//! - `Cached`: keep the parsed set and reload only after `invalidate()` or
//!   when the document's modification time changes.
//!
//! Either way a reload that fails is surfaced to the caller; there is no
//! fallback to a stale or default set.

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use super::{RegionSet, RegionStore};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CachePolicy {
    #[default]
    ReloadEveryFrame,
    Cached,
}

impl std::str::FromStr for CachePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reload" | "reload_every_frame" => Ok(CachePolicy::ReloadEveryFrame),
            "cached" | "cache" => Ok(CachePolicy::Cached),
            other => Err(anyhow::anyhow!(
                "unknown region cache policy '{}' (expected reload or cached)",
                other
            )),
        }
    }
}

enum Backing {
    Store(RegionStore),
    Fixed,
}

/// Source of the current region set for one session.
pub struct RegionCache {
    backing: Backing,
    policy: CachePolicy,
    current: Option<RegionSet>,
    fingerprint: Option<String>,
    modified: Option<SystemTime>,
    stale: bool,
    reloads: u64,
}

impl RegionCache {
    pub fn from_store(store: RegionStore, policy: CachePolicy) -> Self {
        Self {
            backing: Backing::Store(store),
            policy,
            current: None,
            fingerprint: None,
            modified: None,
            stale: true,
            reloads: 0,
        }
    }

    /// A set that never changes, e.g. regions supplied by the caller in memory.
    pub fn fixed(set: RegionSet) -> Self {
        Self {
            backing: Backing::Fixed,
            policy: CachePolicy::Cached,
            fingerprint: Some(set.fingerprint()),
            current: Some(set),
            modified: None,
            stale: false,
            reloads: 0,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// The "regions changed" signal: the next `current()` re-reads the document.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Fingerprint of the set most recently returned.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Number of times the document has been read.
    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    /// Current region set, reloading according to the policy.
    pub fn current(&mut self) -> Result<&RegionSet> {
        if let Backing::Store(store) = &self.backing {
            let modified = modified_time(store.path());
            let needs_reload = self.current.is_none()
                || self.stale
                || self.policy == CachePolicy::ReloadEveryFrame
                || modified != self.modified;
            if needs_reload {
                let set = store.load()?;
                let fingerprint = set.fingerprint();
                if self.fingerprint.as_deref() != Some(fingerprint.as_str()) {
                    if self.fingerprint.is_some() {
                        log::info!(
                            "regions changed: {} regions, fingerprint {}",
                            set.len(),
                            &fingerprint[..12]
                        );
                    }
                    self.fingerprint = Some(fingerprint);
                }
                self.current = Some(set);
                self.modified = modified;
                self.stale = false;
                self.reloads += 1;
            }
        }
        let set = self
            .current
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("region cache has no region set"))?;
        Ok(set)
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
