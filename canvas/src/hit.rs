#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{CanvasTransform, Point};
use crate::consts::{NOTE_HEIGHT, NOTE_WIDTH};
use crate::doc::{Note, NoteDoc, NoteId};

/// An axis-aligned rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Standard axis-aligned intersection test. Rectangles that only touch
    /// along an edge do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right() && self.right() > other.x && self.y < other.bottom() && self.bottom() > other.y
    }

    /// Whether `pt` lies inside the rectangle, edges included.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.right() && pt.y >= self.y && pt.y <= self.bottom()
    }
}

/// Projected screen rectangle of a note: its canvas origin through the
/// transform, with the footprint scaled by the current zoom.
#[must_use]
pub fn note_screen_rect(note: &Note, transform: &CanvasTransform, center: Point) -> Rect {
    let origin = transform.canvas_to_screen(Point::new(note.x, note.y), center);
    Rect {
        x: origin.x,
        y: origin.y,
        width: NOTE_WIDTH * transform.scale,
        height: NOTE_HEIGHT * transform.scale,
    }
}

/// Whether `note`, as currently projected, overlaps a fixed screen rectangle.
#[must_use]
pub fn overlaps(note: &Note, transform: &CanvasTransform, center: Point, fixed: &Rect) -> bool {
    note_screen_rect(note, transform, center).overlaps(fixed)
}

/// The topmost note under `screen_pt`, if any.
#[must_use]
pub fn hit_test(screen_pt: Point, doc: &NoteDoc, transform: &CanvasTransform, center: Point) -> Option<NoteId> {
    doc.sorted_notes()
        .into_iter()
        .rev()
        .find(|note| note_screen_rect(note, transform, center).contains(screen_pt))
        .map(|note| note.id)
}
