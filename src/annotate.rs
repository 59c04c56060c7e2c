//! Frame annotation.
//!
//! Draws, on a copy of the frame:
//! - every region outline, green when occupied and red when free
//! - with `show_labels`, the occupant's class and confidence at the region center
//! - with `draw_detections`, every eligible detection box
//! - an analytics panel with occupied/available counts
//!
//! Text needs a TrueType font supplied at construction. Without one the
//! labels become confidence badges (width proportional to the score) and the
//! panel becomes an occupied/available bar.
//!
//! Regions reaching this module were validated by the region store, which
//! accepts any finite coordinate. Geometry is clipped to a band around the
//! canvas before it is converted to pixels, so drawing has no failure path.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::detect::Detection;
use crate::geometry::Point;
use crate::regions::RegionSet;
use crate::tracker::{OccupancyMap, OccupancySummary};

pub const OCCUPIED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const FREE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const TEXT_BG_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const DETECTION_COLOR: Rgb<u8> = Rgb([255, 200, 0]);

const BADGE_MAX_WIDTH: f32 = 40.0;
const BADGE_HEIGHT: u32 = 8;
const PANEL_BAR_WIDTH: u32 = 120;
const PANEL_BAR_HEIGHT: u32 = 12;
/// Off-canvas slack kept when clamping label anchors.
const LABEL_PAD: u32 = 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotateOptions {
    /// Overlay occupant confidence near each occupied region.
    pub show_labels: bool,
    /// Outline every detection box, matched or not.
    pub draw_detections: bool,
    /// Draw the occupied/available panel.
    pub show_analytics: bool,
    /// Region outline thickness in pixels.
    pub thickness: u32,
    /// Padding around text and panel.
    pub margin: u32,
    /// Text height in pixels.
    pub text_scale: f32,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            show_labels: false,
            draw_detections: false,
            show_analytics: true,
            thickness: 2,
            margin: 10,
            text_scale: 18.0,
        }
    }
}

pub struct Annotator {
    options: AnnotateOptions,
    font: Option<FontVec>,
    warned_no_font: AtomicBool,
}

impl Annotator {
    pub fn new(options: AnnotateOptions) -> Self {
        Self {
            options,
            font: None,
            warned_no_font: AtomicBool::new(false),
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    /// Load a TrueType/OpenType font for labels and the panel.
    pub fn with_font_file(self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read label font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow::anyhow!("invalid label font {}", path.display()))?;
        Ok(self.with_font(font))
    }

    /// Annotated copy of `frame`; the input is left untouched.
    pub fn render(
        &self,
        frame: &RgbImage,
        regions: &RegionSet,
        states: &OccupancyMap,
        detections: &[Detection],
    ) -> RgbImage {
        let mut canvas = frame.clone();
        self.render_mut(&mut canvas, regions, states, detections);
        canvas
    }

    /// Annotate in place, for callers that own the frame.
    pub fn render_mut(
        &self,
        canvas: &mut RgbImage,
        regions: &RegionSet,
        states: &OccupancyMap,
        detections: &[Detection],
    ) {
        if self.font.is_none()
            && (self.options.show_labels || self.options.show_analytics)
            && !self.warned_no_font.swap(true, Ordering::Relaxed)
        {
            log::warn!("no label font configured; drawing confidence badges instead of text");
        }

        if self.options.draw_detections {
            let (width, height) = canvas.dimensions();
            for det in detections {
                let b = det.bbox;
                let x0 = to_pixel(b.x1.min(b.x2), width, 1);
                let y0 = to_pixel(b.y1.min(b.y2), height, 1);
                let x1 = to_pixel(b.x1.max(b.x2), width, 1);
                let y1 = to_pixel(b.y1.max(b.y2), height, 1);
                let w = (x1 - x0).max(1) as u32;
                let h = (y1 - y0).max(1) as u32;
                draw_hollow_rect_mut(canvas, Rect::at(x0, y0).of_size(w, h), DETECTION_COLOR);
            }
        }

        for region in regions {
            let occupied = states.get(region.id()).is_some_and(|s| s.occupied);
            let color = if occupied { OCCUPIED_COLOR } else { FREE_COLOR };
            self.draw_outline(canvas, region.points(), color);
        }

        if self.options.show_labels {
            for region in regions {
                let Some(state) = states.get(region.id()).filter(|s| s.occupied) else {
                    continue;
                };
                let Some(confidence) = state.confidence else {
                    continue;
                };
                let text = match state.class_id {
                    Some(class_id) => format!("{} {:.2}", class_id, confidence),
                    None => format!("{:.2}", confidence),
                };
                self.draw_label(canvas, region.centroid(), &text, confidence);
            }
        }

        if self.options.show_analytics {
            self.draw_analytics(canvas, OccupancySummary::of(states));
        }
    }

    fn draw_outline(&self, canvas: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
        let (width, height) = canvas.dimensions();
        let thickness = self.options.thickness.max(1);
        let n = points.len();
        for i in 0..n {
            let Some((start, end)) =
                clip_segment(points[i], points[(i + 1) % n], width, height, thickness as f64 + 1.0)
            else {
                continue;
            };
            for offset in 0..thickness {
                let d = offset as f32;
                draw_line_segment_mut(canvas, (start.0 + d, start.1), (end.0 + d, end.1), color);
                draw_line_segment_mut(canvas, (start.0, start.1 + d), (end.0, end.1 + d), color);
            }
        }
    }

    /// Text (or badge) centered on `anchor` with a white background.
    fn draw_label(&self, canvas: &mut RgbImage, anchor: Point, text: &str, confidence: f32) {
        let margin = self.options.margin as f32 / 2.0;
        let (width, height) = canvas.dimensions();
        let ax = to_pixel(anchor.x, width, LABEL_PAD);
        let ay = to_pixel(anchor.y, height, LABEL_PAD);
        match &self.font {
            Some(font) => {
                let scale = PxScale::from(self.options.text_scale);
                let (tw, th) = text_extent(font, scale, text);
                let x = ax as f32 - tw / 2.0;
                let y = ay as f32 - th / 2.0;
                let bg = Rect::at((x - margin) as i32, (y - margin) as i32)
                    .of_size((tw + 2.0 * margin).max(1.0) as u32, (th + 2.0 * margin).max(1.0) as u32);
                draw_filled_rect_mut(canvas, bg, TEXT_BG_COLOR);
                draw_text_mut(canvas, TEXT_COLOR, x as i32, y as i32, scale, font, text);
            }
            None => {
                let width = (BADGE_MAX_WIDTH * confidence.clamp(0.0, 1.0)).round().max(1.0) as u32;
                let x = ax - (BADGE_MAX_WIDTH / 2.0) as i32;
                let y = ay - (BADGE_HEIGHT / 2) as i32;
                let frame = Rect::at(x - 1, y - 1).of_size(BADGE_MAX_WIDTH as u32 + 2, BADGE_HEIGHT + 2);
                draw_filled_rect_mut(canvas, frame, TEXT_BG_COLOR);
                draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(width, BADGE_HEIGHT), TEXT_COLOR);
            }
        }
    }

    fn draw_analytics(&self, canvas: &mut RgbImage, summary: OccupancySummary) {
        let margin = self.options.margin as i32;
        match &self.font {
            Some(font) => {
                let scale = PxScale::from(self.options.text_scale);
                let lines = [
                    format!("Occupancy: {}", summary.occupied),
                    format!("Available: {}", summary.free),
                ];
                let extents: Vec<(f32, f32)> =
                    lines.iter().map(|l| text_extent(font, scale, l)).collect();
                let width = extents.iter().map(|e| e.0).fold(0.0, f32::max);
                let line_h = extents.iter().map(|e| e.1).fold(0.0, f32::max);
                let height = line_h * lines.len() as f32 + margin as f32 * (lines.len() as f32 - 1.0);
                let bg = Rect::at(margin, margin).of_size(
                    (width + 2.0 * margin as f32).max(1.0) as u32,
                    (height + 2.0 * margin as f32).max(1.0) as u32,
                );
                draw_filled_rect_mut(canvas, bg, TEXT_BG_COLOR);
                for (i, line) in lines.iter().enumerate() {
                    let y = 2 * margin + i as i32 * (line_h as i32 + margin);
                    draw_text_mut(canvas, TEXT_COLOR, 2 * margin, y, scale, font, line);
                }
            }
            None => {
                let bg = Rect::at(margin - 1, margin - 1).of_size(PANEL_BAR_WIDTH + 2, PANEL_BAR_HEIGHT + 2);
                draw_filled_rect_mut(canvas, bg, TEXT_BG_COLOR);
                if summary.total == 0 {
                    return;
                }
                let occupied_w =
                    (PANEL_BAR_WIDTH as usize * summary.occupied / summary.total) as u32;
                if occupied_w > 0 {
                    let r = Rect::at(margin, margin).of_size(occupied_w, PANEL_BAR_HEIGHT);
                    draw_filled_rect_mut(canvas, r, OCCUPIED_COLOR);
                }
                let free_w = PANEL_BAR_WIDTH - occupied_w;
                if free_w > 0 {
                    let r = Rect::at(margin + occupied_w as i32, margin).of_size(free_w, PANEL_BAR_HEIGHT);
                    draw_filled_rect_mut(canvas, r, FREE_COLOR);
                }
            }
        }
    }
}

/// `v` rounded to a pixel coordinate within `pad` pixels of `[0, limit]`.
fn to_pixel(v: f64, limit: u32, pad: u32) -> i32 {
    let pad = pad as f64;
    v.clamp(-pad, limit as f64 + pad).round() as i32
}

/// Liang-Barsky clip of segment a-b to the canvas grown by `pad` on every
/// side. `None` when the segment lies entirely outside.
fn clip_segment(
    a: Point,
    b: Point,
    width: u32,
    height: u32,
    pad: f64,
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (x_max, y_max) = (width as f64 + pad, height as f64 + pad);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-dx, a.x + pad),
        (dx, x_max - a.x),
        (-dy, a.y + pad),
        (dy, y_max - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    let at = |t: f64| ((a.x + t * dx) as f32, (a.y + t * dy) as f32);
    Some((at(t0), at(t1)))
}

/// Width and height of `text` laid out on one line.
fn text_extent(font: &FontVec, scale: PxScale, text: &str) -> (f32, f32) {
    let scaled = font.as_scaled(scale);
    let width: f32 = text
        .chars()
        .map(|c| scaled.h_advance(scaled.glyph_id(c)))
        .sum();
    (width, scaled.height())
}
