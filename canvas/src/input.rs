//! Input model: mouse buttons, modifier keys, and the gesture state machine.
//!
//! `Button`, `Modifiers`, `Key` and `WheelDelta` describe raw events routed
//! in by the host. `InputState` is the gesture being tracked between
//! pointer-down and pointer-up, carrying the context needed to compute
//! deltas and emit final intents on release. `Mode` is the coarse,
//! externally visible projection of that state.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::doc::{NoteColor, NoteId};

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the host (e.g. `"Escape"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// The id of the currently selected note, if any.
    pub selected_id: Option<NoteId>,
    /// Canvas position of the ghost note while in add mode.
    pub ghost: Option<Point>,
}

/// Coarse interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Adding,
    Dragging,
    Panning,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// A ghost note follows the pointer until a primary click places it.
    Adding {
        /// Color the placed note will get.
        color: NoteColor,
    },
    /// Primary button is down on a note but travel has not passed the drag threshold.
    PendingDrag {
        /// Note under the press.
        id: NoteId,
        /// Screen position of the press.
        start_screen: Point,
    },
    /// An existing note follows the pointer.
    Dragging {
        /// Note being dragged.
        id: NoteId,
        /// Screen position of the original press; deltas are measured from here.
        start_screen: Point,
        /// Note x at the start of the drag.
        orig_x: f64,
        /// Note y at the start of the drag.
        orig_y: f64,
        /// Result of the most recent trash-overlap test.
        over_trash: bool,
    },
    /// The secondary button is held and the view follows the pointer.
    Panning {
        /// Screen position of the previous pointer event.
        last_screen: Point,
        /// Add-mode color to restore on release, if panning interrupted add mode.
        resume_adding: Option<NoteColor>,
    },
}

impl InputState {
    /// Coarse mode; a pending drag still reads as idle.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::Idle | Self::PendingDrag { .. } => Mode::Idle,
            Self::Adding { .. } => Mode::Adding,
            Self::Dragging { .. } => Mode::Dragging,
            Self::Panning { .. } => Mode::Panning,
        }
    }
}
