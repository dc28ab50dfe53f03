#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{FIT_PADDING, MAX_SCALE, MIN_SCALE, NOTE_HEIGHT, NOTE_WIDTH};
use crate::doc::Note;

/// A point in either screen or canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Visible canvas area in screen pixels, excluding any fixed chrome.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Logical center of the viewport; the origin the transform offset is measured from.
    #[must_use]
    pub fn center(&self) -> Point {
        Point { x: self.width / 2.0, y: self.height / 2.0 }
    }
}

/// Pan/zoom state mapping canvas coordinates onto the screen.
///
/// `offset_x` / `offset_y` are screen pixels relative to the viewport center.
/// `scale` multiplies canvas distances into screen distances and always lies
/// in `[MIN_SCALE, MAX_SCALE]` when produced by the operations below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self { scale: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }
}

/// Clamp a scale into the allowed zoom range.
#[must_use]
pub fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

impl CanvasTransform {
    /// Convert a screen point to canvas coordinates: `(screen - center - offset) / scale`.
    #[must_use]
    pub fn screen_to_canvas(&self, screen: Point, center: Point) -> Point {
        Point {
            x: (screen.x - center.x - self.offset_x) / self.scale,
            y: (screen.y - center.y - self.offset_y) / self.scale,
        }
    }

    /// Convert a canvas point to screen coordinates: `center + offset + canvas * scale`.
    #[must_use]
    pub fn canvas_to_screen(&self, canvas: Point, center: Point) -> Point {
        Point {
            x: center.x + self.offset_x + canvas.x * self.scale,
            y: center.y + self.offset_y + canvas.y * self.scale,
        }
    }

    /// Convert a screen-space distance (pixels) to canvas units.
    #[must_use]
    pub fn screen_dist_to_canvas(&self, screen_dist: f64) -> f64 {
        screen_dist / self.scale
    }

    /// Zoom by `factor`, keeping the canvas point under `anchor` fixed on screen.
    ///
    /// The new scale is clamped before the offset is solved, so once the scale
    /// sits on a boundary further zoom in that direction returns `self` unchanged.
    #[must_use]
    pub fn apply_zoom(&self, factor: f64, anchor: Point, center: Point) -> Self {
        let world = self.screen_to_canvas(anchor, center);
        let scale = clamp_scale(self.scale * factor);
        if (scale - self.scale).abs() < f64::EPSILON {
            return *self;
        }
        Self {
            scale,
            offset_x: anchor.x - center.x - world.x * scale,
            offset_y: anchor.y - center.y - world.y * scale,
        }
    }

    /// Shift the view by a raw screen-pixel delta, independent of scale.
    #[must_use]
    pub fn apply_pan(&self, dx: f64, dy: f64) -> Self {
        Self { scale: self.scale, offset_x: self.offset_x + dx, offset_y: self.offset_y + dy }
    }

    /// Frame every note in the viewport.
    ///
    /// Takes the bounding box of all note footprints, pads it by
    /// [`FIT_PADDING`] on each side, picks the largest scale (capped at
    /// [`MAX_SCALE`], floored at [`MIN_SCALE`]) at which the padded box fits
    /// both axes, and centers the box. Returns the default transform when
    /// there are no notes or the viewport has no area.
    #[must_use]
    pub fn fit_to_content<'a>(notes: impl IntoIterator<Item = &'a Note>, viewport: Viewport) -> Self {
        let Some(bounds) = content_bounds(notes) else {
            return Self::default();
        };
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return Self::default();
        }

        let box_w = bounds.max_x - bounds.min_x + 2.0 * FIT_PADDING;
        let box_h = bounds.max_y - bounds.min_y + 2.0 * FIT_PADDING;
        let scale = clamp_scale((viewport.width / box_w).min(viewport.height / box_h));

        let mid_x = (bounds.min_x + bounds.max_x) / 2.0;
        let mid_y = (bounds.min_y + bounds.max_y) / 2.0;
        Self { scale, offset_x: -mid_x * scale, offset_y: -mid_y * scale }
    }
}

/// Axis-aligned canvas-space bounds of a set of note footprints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Bounding box of every note's position plus its footprint, or `None` for no notes.
#[must_use]
pub fn content_bounds<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Option<Bounds> {
    notes.into_iter().fold(None, |acc, note| {
        let right = note.x + NOTE_WIDTH;
        let bottom = note.y + NOTE_HEIGHT;
        Some(match acc {
            None => Bounds { min_x: note.x, min_y: note.y, max_x: right, max_y: bottom },
            Some(b) => Bounds {
                min_x: b.min_x.min(note.x),
                min_y: b.min_y.min(note.y),
                max_x: b.max_x.max(right),
                max_y: b.max_y.max(bottom),
            },
        })
    })
}
