//! Shared numeric constants for the canvas crate.

// ── Zoom ────────────────────────────────────────────────────────

/// Smallest allowed transform scale.
pub const MIN_SCALE: f64 = 0.3;

/// Largest allowed transform scale.
pub const MAX_SCALE: f64 = 2.0;

/// Multiplicative zoom step applied per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 1.1;

/// Multiplicative zoom step applied by the toolbar zoom buttons.
pub const BUTTON_ZOOM_STEP: f64 = 1.2;

/// Canvas-space padding added around the note bounding box when framing content.
pub const FIT_PADDING: f64 = 50.0;

// ── Notes ───────────────────────────────────────────────────────

/// Note footprint width in canvas units.
pub const NOTE_WIDTH: f64 = 200.0;

/// Note footprint height in canvas units.
pub const NOTE_HEIGHT: f64 = 200.0;

// ── Gestures ────────────────────────────────────────────────────

/// Pointer travel in screen pixels a press must exceed before it becomes a drag.
pub const DRAG_THRESHOLD_PX: f64 = 3.0;
