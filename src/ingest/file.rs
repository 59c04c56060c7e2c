//! Local file frame source.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::Frame;

const DEFAULT_STUB_WIDTH: u32 = 640;
const DEFAULT_STUB_HEIGHT: u32 = 480;
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Image file, directory of images, or `stub://WxH?frames=N`.
    pub path: String,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_frames: None,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    config: FileConfig,
    backend: FileBackend,
    frames_read: u64,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    Images(ImageSequence),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let backend = match config.path.strip_prefix("stub://") {
            Some(rest) => FileBackend::Synthetic(SyntheticSource::parse(rest)?),
            None => FileBackend::Images(ImageSequence::open(Path::new(&config.path))?),
        };
        log::info!("FileSource: opened {} ({} frames)", config.path, backend.len());
        Ok(Self {
            config,
            backend,
            frames_read: 0,
        })
    }

    /// Next decoded frame, or `None` at end of input.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frames_read >= max)
        {
            return Ok(None);
        }
        let index = self.frames_read;
        let frame = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(index),
            FileBackend::Images(source) => source.next_frame(index)?,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_read: self.frames_read,
            frames_total: self.backend.len(),
            path: self.config.path.clone(),
        }
    }
}

impl Iterator for FileSource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_read: u64,
    pub frames_total: u64,
    pub path: String,
}

impl FileBackend {
    fn len(&self) -> u64 {
        match self {
            FileBackend::Synthetic(source) => source.frames,
            FileBackend::Images(source) => source.paths.len() as u64,
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticSource {
    width: u32,
    height: u32,
    frames: u64,
}

impl SyntheticSource {
    /// Parse the part after `stub://`, e.g. `640x480?frames=10`.
    fn parse(spec: &str) -> Result<Self> {
        let (dims, query) = match spec.split_once('?') {
            Some((dims, query)) => (dims, Some(query)),
            None => (spec, None),
        };
        let (width, height) = if dims.is_empty() {
            (DEFAULT_STUB_WIDTH, DEFAULT_STUB_HEIGHT)
        } else {
            let (w, h) = dims
                .split_once('x')
                .ok_or_else(|| anyhow!("stub source must look like stub://WIDTHxHEIGHT"))?;
            let width: u32 = w.parse().map_err(|_| anyhow!("invalid stub width '{}'", w))?;
            let height: u32 = h.parse().map_err(|_| anyhow!("invalid stub height '{}'", h))?;
            (width, height)
        };
        if width == 0 || height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        let mut frames = 1;
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("frames", n)) => {
                    frames = n
                        .parse()
                        .map_err(|_| anyhow!("invalid stub frame count '{}'", n))?;
                }
                _ => return Err(anyhow!("unknown stub parameter '{}'", pair)),
            }
        }
        Ok(Self {
            width,
            height,
            frames,
        })
    }

    fn next_frame(&mut self, index: u64) -> Option<Frame> {
        (index < self.frames).then(|| Frame::blank(index, self.width, self.height))
    }
}

// ----------------------------------------------------------------------------
// Image files
// ----------------------------------------------------------------------------

struct ImageSequence {
    paths: Vec<PathBuf>,
}

impl ImageSequence {
    fn open(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("failed to open input {}", path.display()))?;
        let paths = if meta.is_dir() {
            let mut paths = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("failed to list {}", path.display()))?
            {
                let candidate = entry?.path();
                if candidate.is_file() && has_image_extension(&candidate) {
                    paths.push(candidate);
                }
            }
            paths.sort();
            if paths.is_empty() {
                return Err(anyhow!("no JPEG or PNG images in {}", path.display()));
            }
            paths
        } else {
            vec![path.to_path_buf()]
        };
        Ok(Self { paths })
    }

    fn next_frame(&mut self, index: u64) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(index as usize) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        Ok(Some(Frame::new(index, image)))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

pub fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
