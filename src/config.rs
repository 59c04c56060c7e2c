use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::annotate::{AnnotateOptions, Annotator};
use crate::detect::{DetectOptions, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_VEHICLE_CLASSES};
use crate::regions::{CachePolicy, RegionCache, RegionStore};
use crate::session::FrameEngine;

const DEFAULT_REGIONS_PATH: &str = "bounding_boxes.json";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EngineConfigFile {
    regions: Option<RegionsConfigFile>,
    detection: Option<DetectionConfigFile>,
    annotate: Option<AnnotateConfigFile>,
    tracking: Option<TrackingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RegionsConfigFile {
    path: Option<PathBuf>,
    cache: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    classes: Option<Vec<u32>>,
    persist: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnnotateConfigFile {
    show_labels: Option<bool>,
    draw_detections: Option<bool>,
    show_analytics: Option<bool>,
    label_font: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackingConfigFile {
    hold_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub regions_path: PathBuf,
    pub region_cache: CachePolicy,
    pub detect: DetectOptions,
    pub annotate: AnnotateOptions,
    pub label_font: Option<PathBuf>,
    pub hold_frames: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            regions_path: PathBuf::from(DEFAULT_REGIONS_PATH),
            region_cache: CachePolicy::default(),
            detect: DetectOptions::default(),
            annotate: AnnotateOptions::default(),
            label_font: None,
            hold_frames: 0,
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EngineConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let regions = file.regions.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let annotate = file.annotate.unwrap_or_default();

        let region_cache = match regions.cache.as_deref() {
            Some(policy) => policy.parse()?,
            None => defaults.region_cache,
        };
        let detect = DetectOptions {
            confidence_threshold: detection
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            persist: detection.persist.unwrap_or(defaults.detect.persist),
            class_filter: match detection.classes {
                Some(classes) => classes.into_iter().collect(),
                None => DEFAULT_VEHICLE_CLASSES.iter().copied().collect(),
            },
        };
        let annotate_opts = AnnotateOptions {
            show_labels: annotate.show_labels.unwrap_or(defaults.annotate.show_labels),
            draw_detections: annotate
                .draw_detections
                .unwrap_or(defaults.annotate.draw_detections),
            show_analytics: annotate
                .show_analytics
                .unwrap_or(defaults.annotate.show_analytics),
            ..defaults.annotate
        };
        Ok(Self {
            regions_path: regions.path.unwrap_or(defaults.regions_path),
            region_cache,
            detect,
            annotate: annotate_opts,
            label_font: annotate.label_font,
            hold_frames: file
                .tracking
                .and_then(|tracking| tracking.hold_frames)
                .unwrap_or(defaults.hold_frames),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PARKWATCH_REGIONS") {
            if !path.trim().is_empty() {
                self.regions_path = PathBuf::from(path);
            }
        }
        if let Ok(confidence) = std::env::var("PARKWATCH_CONFIDENCE") {
            self.detect.confidence_threshold = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Ok(show) = std::env::var("PARKWATCH_SHOW_LABELS") {
            self.annotate.show_labels = parse_bool(&show)
                .ok_or_else(|| anyhow!("PARKWATCH_SHOW_LABELS must be true or false"))?;
        }
        if let Ok(classes) = std::env::var("PARKWATCH_CLASSES") {
            self.detect.class_filter = parse_classes(&classes)?;
        }
        if let Ok(hold) = std::env::var("PARKWATCH_HOLD_FRAMES") {
            self.hold_frames = hold
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_HOLD_FRAMES must be a non-negative integer"))?;
        }
        if let Ok(font) = std::env::var("PARKWATCH_FONT") {
            if !font.trim().is_empty() {
                self.label_font = Some(PathBuf::from(font));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.detect.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "confidence_threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        if self.regions_path.as_os_str().is_empty() {
            return Err(anyhow!("regions path must not be empty"));
        }
        Ok(())
    }

    /// Annotator with the configured font, when one is set.
    pub fn annotator(&self) -> Result<Annotator> {
        let annotator = Annotator::new(self.annotate.clone());
        match &self.label_font {
            Some(path) => annotator.with_font_file(path),
            None => Ok(annotator),
        }
    }

    pub fn engine(&self) -> Result<FrameEngine> {
        Ok(FrameEngine::new(self.detect.clone(), self.annotator()?).with_hold_frames(self.hold_frames))
    }

    pub fn region_cache(&self) -> RegionCache {
        RegionCache::from_store(RegionStore::new(&self.regions_path), self.region_cache)
    }
}

fn read_config_file(path: &Path) -> Result<EngineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

/// Comma-separated class ids; empty input admits every class.
pub fn parse_classes(value: &str) -> Result<BTreeSet<u32>> {
    split_csv(value)
        .iter()
        .map(|entry| {
            entry
                .parse::<u32>()
                .map_err(|_| anyhow!("invalid class id '{}'", entry))
        })
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
