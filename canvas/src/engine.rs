use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::camera::{CanvasTransform, Point, Viewport, clamp_scale};
use crate::consts::{BUTTON_ZOOM_STEP, DRAG_THRESHOLD_PX, WHEEL_ZOOM_STEP};
use crate::doc::{Note, NoteColor, NoteDoc, NoteId, NotePatch};
use crate::hit::{self, Rect};
use crate::input::{Button, InputState, Key, Mode, Modifiers, UiState, WheelDelta};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A note was placed; the host should persist it.
    NoteCreated(Note),
    /// Fields of a note changed locally; the host should issue a lock-gated write.
    NoteUpdated { id: NoteId, fields: NotePatch },
    /// A note was dropped into the trash; the host should delete it and clean up its lock.
    NoteDeleted { id: NoteId },
    /// The selected note changed.
    SelectionChanged(Option<NoteId>),
    /// The pointer moved to this canvas position; the host may broadcast it.
    CursorMoved(Point),
    /// The transform or z-index counter changed; the host should persist it.
    ViewChanged(ViewState),
    /// Pointer cursor style hint (`"default"`, `"crosshair"`, `"grabbing"`).
    SetCursor(String),
    RenderNeeded,
}

/// Client-local view state persisted between sessions. Never synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewState {
    pub transform: CanvasTransform,
    /// Last z-index handed out by this client.
    pub z_counter: u64,
}

/// Core engine state: the interaction mode machine over a local note cache.
pub struct EngineCore {
    pub doc: NoteDoc,
    pub transform: CanvasTransform,
    pub ui: UiState,
    pub input: InputState,
    pub viewport: Viewport,
    /// Fixed screen rectangle of the trash bin, if the host shows one.
    pub trash: Option<Rect>,
    foreign_locks: HashSet<NoteId>,
    z_counter: u64,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            doc: NoteDoc::new(),
            transform: CanvasTransform::default(),
            ui: UiState::default(),
            input: InputState::default(),
            viewport: Viewport::default(),
            trash: None,
            foreign_locks: HashSet::new(),
            z_counter: 0,
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Data inputs ---

    /// Replace the note cache with a store snapshot.
    ///
    /// A note being dragged keeps its local position so it does not jump back
    /// under the pointer while writes are in flight.
    pub fn load_snapshot(&mut self, notes: Vec<Note>) {
        let held = match self.input {
            InputState::Dragging { id, .. } => self.doc.get(&id).map(|n| (id, n.x, n.y)),
            _ => None,
        };
        self.doc.load_snapshot(notes);

        if let Some((id, x, y)) = held {
            if !self.doc.apply_patch(&id, &NotePatch::position(x, y)) {
                self.input = InputState::Idle;
            }
        }
        if let InputState::PendingDrag { id, .. } = self.input {
            if self.doc.get(&id).is_none() {
                self.input = InputState::Idle;
            }
        }
        if let Some(selected) = self.ui.selected_id {
            if self.doc.get(&selected).is_none() {
                self.ui.selected_id = None;
            }
        }
    }

    /// Replace the set of notes currently locked by other users.
    pub fn set_foreign_locks(&mut self, ids: impl IntoIterator<Item = NoteId>) {
        self.foreign_locks = ids.into_iter().collect();
    }

    /// Whether another user holds the editing lock on `id`.
    #[must_use]
    pub fn is_locked_by_other(&self, id: &NoteId) -> bool {
        self.foreign_locks.contains(id)
    }

    /// Apply a local text/color edit. Dropped when another user holds the lock.
    pub fn edit_note(&mut self, id: &NoteId, patch: NotePatch) -> Vec<Action> {
        if patch.is_empty() || self.is_locked_by_other(id) {
            return Vec::new();
        }
        if !self.doc.apply_patch(id, &patch) {
            return Vec::new();
        }
        vec![Action::NoteUpdated { id: *id, fields: patch }, Action::RenderNeeded]
    }

    /// Create a note at a canvas position without going through add mode.
    pub fn place_note_at(&mut self, at: Point, color: NoteColor) -> Vec<Action> {
        let note = self.insert_note(at, color);
        let id = note.id;
        let mut actions = vec![Action::NoteCreated(note)];
        actions.extend(self.select(Some(id)));
        actions.push(Action::ViewChanged(self.view_state()));
        actions
    }

    /// Delete a note directly. Refused when another user holds its lock.
    pub fn delete_note(&mut self, id: &NoteId) -> Vec<Action> {
        if self.is_locked_by_other(id) || self.doc.get(id).is_none() {
            return Vec::new();
        }
        let gesture_on_note = match self.input {
            InputState::Dragging { id: held, .. } | InputState::PendingDrag { id: held, .. } => held == *id,
            _ => false,
        };
        if gesture_on_note {
            self.input = InputState::Idle;
        }
        let mut actions = self.remove_note(*id);
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Viewport / view state ---

    /// Update the viewport dimensions (CSS pixels, chrome excluded).
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
    }

    /// Set or clear the trash bin's fixed screen rectangle.
    pub fn set_trash_rect(&mut self, rect: Option<Rect>) {
        self.trash = rect;
    }

    /// Restore a persisted view. The scale is clamped into the allowed range.
    pub fn restore_view(&mut self, view: ViewState) {
        self.transform = CanvasTransform { scale: clamp_scale(view.transform.scale), ..view.transform };
        self.z_counter = view.z_counter;
    }

    #[must_use]
    pub fn view_state(&self) -> ViewState {
        ViewState { transform: self.transform, z_counter: self.z_counter }
    }

    fn next_z(&mut self) -> u64 {
        self.z_counter = self.z_counter.saturating_add(1);
        self.z_counter
    }

    fn set_transform(&mut self, next: CanvasTransform) -> Vec<Action> {
        if next == self.transform {
            return Vec::new();
        }
        self.transform = next;
        vec![Action::ViewChanged(self.view_state()), Action::RenderNeeded]
    }

    // --- Toolbar ---

    /// Start placing a new note of `color`. Ignored while a drag is in progress.
    pub fn enter_add_mode(&mut self, color: NoteColor) -> Vec<Action> {
        if matches!(self.input, InputState::Dragging { .. } | InputState::Panning { .. }) {
            return Vec::new();
        }
        self.input = InputState::Adding { color };
        vec![Action::SetCursor("crosshair".into()), Action::RenderNeeded]
    }

    /// Leave add mode without placing anything.
    pub fn cancel_add_mode(&mut self) -> Vec<Action> {
        if !matches!(self.input, InputState::Adding { .. }) {
            return Vec::new();
        }
        self.input = InputState::Idle;
        self.ui.ghost = None;
        vec![Action::SetCursor("default".into()), Action::RenderNeeded]
    }

    /// Zoom in one step around the viewport center.
    pub fn zoom_in(&mut self) -> Vec<Action> {
        let center = self.viewport.center();
        self.set_transform(self.transform.apply_zoom(BUTTON_ZOOM_STEP, center, center))
    }

    /// Zoom out one step around the viewport center.
    pub fn zoom_out(&mut self) -> Vec<Action> {
        let center = self.viewport.center();
        self.set_transform(self.transform.apply_zoom(1.0 / BUTTON_ZOOM_STEP, center, center))
    }

    /// Return to the default transform.
    pub fn reset_view(&mut self) -> Vec<Action> {
        self.set_transform(CanvasTransform::default())
    }

    /// Frame every note in the viewport.
    pub fn fit_to_content(&mut self) -> Vec<Action> {
        self.set_transform(CanvasTransform::fit_to_content(self.doc.iter(), self.viewport))
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        match button {
            Button::Secondary => self.begin_pan(screen_pt),
            Button::Primary if matches!(self.input, InputState::Idle) => self.press(screen_pt),
            _ => Vec::new(),
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        let canvas_pt = self.transform.screen_to_canvas(screen_pt, self.viewport.center());
        let mut actions = vec![Action::CursorMoved(canvas_pt)];

        match self.input {
            InputState::Idle => {}
            InputState::Adding { .. } => {
                self.ui.ghost = Some(canvas_pt);
                actions.push(Action::RenderNeeded);
            }
            InputState::PendingDrag { id, start_screen } => {
                if screen_pt.distance(start_screen) > DRAG_THRESHOLD_PX {
                    actions.extend(self.start_drag(id, start_screen));
                    actions.extend(self.drag_to(screen_pt));
                }
            }
            InputState::Dragging { .. } => actions.extend(self.drag_to(screen_pt)),
            InputState::Panning { last_screen, resume_adding } => {
                self.transform = self
                    .transform
                    .apply_pan(screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                self.input = InputState::Panning { last_screen: screen_pt, resume_adding };
                actions.push(Action::RenderNeeded);
            }
        }
        actions
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        match (button, self.input.clone()) {
            (Button::Secondary, InputState::Panning { resume_adding, .. }) => {
                let cursor = if let Some(color) = resume_adding {
                    self.input = InputState::Adding { color };
                    "crosshair"
                } else {
                    self.input = InputState::Idle;
                    "default"
                };
                vec![Action::ViewChanged(self.view_state()), Action::SetCursor(cursor.into())]
            }
            (Button::Primary, InputState::PendingDrag { .. }) => {
                self.input = InputState::Idle;
                Vec::new()
            }
            (Button::Primary, InputState::Dragging { id, over_trash, .. }) => {
                self.input = InputState::Idle;
                let mut actions = vec![Action::SetCursor("default".into())];
                if over_trash {
                    actions.extend(self.remove_note(id));
                }
                actions.push(Action::RenderNeeded);
                actions
            }
            (Button::Primary, InputState::Adding { color }) => self.place_note(screen_pt, color),
            _ => Vec::new(),
        }
    }

    /// Wheel always attempts a zoom anchored at the pointer, whatever the mode.
    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, _modifiers: Modifiers) -> Vec<Action> {
        let factor = if delta.dy < 0.0 {
            WHEEL_ZOOM_STEP
        } else if delta.dy > 0.0 {
            1.0 / WHEEL_ZOOM_STEP
        } else {
            return Vec::new();
        };
        let next = self
            .transform
            .apply_zoom(factor, screen_pt, self.viewport.center());
        self.set_transform(next)
    }

    pub fn on_key_down(&mut self, key: Key, _modifiers: Modifiers) -> Vec<Action> {
        if !key.is("Escape") {
            return Vec::new();
        }
        match self.input {
            InputState::Adding { .. } => self.cancel_add_mode(),
            InputState::Dragging { id, orig_x, orig_y, .. } => {
                self.input = InputState::Idle;
                let patch = NotePatch::position(orig_x, orig_y);
                if !self.doc.apply_patch(&id, &patch) {
                    return Vec::new();
                }
                vec![
                    Action::NoteUpdated { id, fields: patch },
                    Action::SetCursor("default".into()),
                    Action::RenderNeeded,
                ]
            }
            InputState::Idle | InputState::PendingDrag { .. } => {
                self.input = InputState::Idle;
                self.select(None)
            }
            InputState::Panning { .. } => Vec::new(),
        }
    }

    // --- Gesture helpers ---

    /// A secondary press pans from any state. An active drag ends in place:
    /// the note keeps its last position and the trash is not consulted.
    fn begin_pan(&mut self, screen_pt: Point) -> Vec<Action> {
        let resume_adding = match self.input {
            InputState::Panning { .. } => return Vec::new(),
            InputState::Adding { color } => Some(color),
            InputState::Idle | InputState::PendingDrag { .. } | InputState::Dragging { .. } => None,
        };
        self.input = InputState::Panning { last_screen: screen_pt, resume_adding };
        vec![Action::SetCursor("grabbing".into())]
    }

    fn press(&mut self, screen_pt: Point) -> Vec<Action> {
        let hit = hit::hit_test(screen_pt, &self.doc, &self.transform, self.viewport.center());
        let actions = self.select(hit);
        if let Some(id) = hit {
            if !self.is_locked_by_other(&id) {
                self.input = InputState::PendingDrag { id, start_screen: screen_pt };
            }
        }
        actions
    }

    fn select(&mut self, id: Option<NoteId>) -> Vec<Action> {
        if self.ui.selected_id == id {
            return Vec::new();
        }
        self.ui.selected_id = id;
        vec![Action::SelectionChanged(id), Action::RenderNeeded]
    }

    /// Promote a pending press to a drag and bring the note to the front.
    fn start_drag(&mut self, id: NoteId, start_screen: Point) -> Vec<Action> {
        let Some(note) = self.doc.get(&id) else {
            self.input = InputState::Idle;
            return Vec::new();
        };
        let (orig_x, orig_y) = (note.x, note.y);
        let patch = NotePatch::z_index(self.next_z());
        self.doc.apply_patch(&id, &patch);
        self.input = InputState::Dragging { id, start_screen, orig_x, orig_y, over_trash: false };
        vec![
            Action::NoteUpdated { id, fields: patch },
            Action::ViewChanged(self.view_state()),
            Action::SetCursor("grabbing".into()),
        ]
    }

    /// Move the dragged note so it tracks the pointer, then re-test the trash overlap.
    fn drag_to(&mut self, screen_pt: Point) -> Vec<Action> {
        let InputState::Dragging { id, start_screen, orig_x, orig_y, .. } = self.input else {
            return Vec::new();
        };
        let x = orig_x + self.transform.screen_dist_to_canvas(screen_pt.x - start_screen.x);
        let y = orig_y + self.transform.screen_dist_to_canvas(screen_pt.y - start_screen.y);
        let patch = NotePatch::position(x, y);
        if !self.doc.apply_patch(&id, &patch) {
            self.input = InputState::Idle;
            return Vec::new();
        }

        let center = self.viewport.center();
        let over_trash = match (self.trash, self.doc.get(&id)) {
            (Some(trash), Some(note)) => hit::overlaps(note, &self.transform, center, &trash),
            _ => false,
        };
        self.input = InputState::Dragging { id, start_screen, orig_x, orig_y, over_trash };
        vec![Action::NoteUpdated { id, fields: patch }, Action::RenderNeeded]
    }

    fn insert_note(&mut self, at: Point, color: NoteColor) -> Note {
        let note = Note::new(at.x, at.y, color, self.next_z());
        self.doc.insert(note.clone());
        note
    }

    fn place_note(&mut self, screen_pt: Point, color: NoteColor) -> Vec<Action> {
        let at = self.transform.screen_to_canvas(screen_pt, self.viewport.center());
        let note = self.insert_note(at, color);
        let id = note.id;
        self.input = InputState::Idle;
        self.ui.ghost = None;
        self.ui.selected_id = Some(id);
        vec![
            Action::NoteCreated(note),
            Action::SelectionChanged(Some(id)),
            Action::ViewChanged(self.view_state()),
            Action::SetCursor("default".into()),
            Action::RenderNeeded,
        ]
    }

    fn remove_note(&mut self, id: NoteId) -> Vec<Action> {
        self.doc.remove(&id);
        let mut actions = Vec::new();
        if self.ui.selected_id == Some(id) {
            self.ui.selected_id = None;
            actions.push(Action::SelectionChanged(None));
        }
        actions.push(Action::NoteDeleted { id });
        actions
    }

    // --- Queries ---

    /// The currently selected note, if any.
    #[must_use]
    pub fn selection(&self) -> Option<NoteId> {
        self.ui.selected_id
    }

    #[must_use]
    pub fn transform(&self) -> CanvasTransform {
        self.transform
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.input.mode()
    }

    /// Canvas position of the ghost note while adding.
    #[must_use]
    pub fn ghost(&self) -> Option<Point> {
        match self.input {
            InputState::Adding { .. } => self.ui.ghost,
            _ => None,
        }
    }

    /// Whether the note being dragged currently overlaps the trash bin.
    #[must_use]
    pub fn over_trash(&self) -> bool {
        matches!(self.input, InputState::Dragging { over_trash: true, .. })
    }

    #[must_use]
    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.doc.get(id)
    }

    /// Notes in paint order, bottom first.
    #[must_use]
    pub fn notes(&self) -> Vec<&Note> {
        self.doc.sorted_notes()
    }
}
