#![allow(clippy::float_cmp)]

use super::*;
use crate::consts::MAX_SCALE;

// =============================================================
// Helpers
// =============================================================

const EPSILON: f64 = 1e-9;

fn engine() -> EngineCore {
    let mut core = EngineCore::new();
    core.set_viewport(800.0, 600.0);
    core
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn no_mods() -> Modifiers {
    Modifiers::default()
}

fn escape() -> Key {
    Key("Escape".into())
}

/// Insert a note whose top-left lands on screen `(sx, sy)` under the default transform.
fn add_note_at_screen(core: &mut EngineCore, sx: f64, sy: f64, z: u64) -> NoteId {
    let note = Note::new(sx - 400.0, sy - 300.0, NoteColor::Yellow, z);
    let id = note.id;
    core.doc.insert(note);
    id
}

fn down(core: &mut EngineCore, p: Point) -> Vec<Action> {
    core.on_pointer_down(p, Button::Primary, no_mods())
}

fn up(core: &mut EngineCore, p: Point) -> Vec<Action> {
    core.on_pointer_up(p, Button::Primary, no_mods())
}

fn mv(core: &mut EngineCore, p: Point) -> Vec<Action> {
    core.on_pointer_move(p, no_mods())
}

fn has_deleted(actions: &[Action], id: NoteId) -> bool {
    actions.iter().any(|a| matches!(a, Action::NoteDeleted { id: d } if *d == id))
}

fn view_changes(actions: &[Action]) -> usize {
    actions.iter().filter(|a| matches!(a, Action::ViewChanged(_))).count()
}

// =============================================================
// Defaults and view state
// =============================================================

#[test]
fn new_engine_is_idle_and_empty() {
    let core = EngineCore::new();
    assert_eq!(core.mode(), Mode::Idle);
    assert!(core.selection().is_none());
    assert!(core.notes().is_empty());
    assert_eq!(core.transform(), CanvasTransform::default());
    assert_eq!(core.view_state().z_counter, 0);
}

#[test]
fn restore_view_clamps_scale() {
    let mut core = engine();
    core.restore_view(ViewState {
        transform: CanvasTransform { scale: 9.0, offset_x: 5.0, offset_y: 6.0 },
        z_counter: 42,
    });
    assert_eq!(core.transform().scale, MAX_SCALE);
    assert_eq!(core.transform().offset_x, 5.0);
    assert_eq!(core.view_state().z_counter, 42);
}

#[test]
fn view_state_serde_round_trip_shape() {
    let view = ViewState { transform: CanvasTransform::default(), z_counter: 3 };
    let json = serde_json::to_value(view).unwrap();
    assert_eq!(json["z_counter"], serde_json::json!(3));
    assert_eq!(json["transform"]["scale"], serde_json::json!(1.0));
}

// =============================================================
// Add mode
// =============================================================

#[test]
fn add_mode_places_note_at_click() {
    let mut core = engine();
    core.enter_add_mode(NoteColor::Blue);
    assert_eq!(core.mode(), Mode::Adding);

    let actions = up(&mut core, pt(500.0, 350.0));
    let created = actions.iter().find_map(|a| match a {
        Action::NoteCreated(n) => Some(n.clone()),
        _ => None,
    });
    let note = created.unwrap();
    assert_eq!((note.x, note.y), (100.0, 50.0));
    assert_eq!(note.color, NoteColor::Blue);
    assert_eq!(note.z_index, 1);
    assert_eq!(core.mode(), Mode::Idle);
    assert_eq!(core.selection(), Some(note.id));
    assert!(core.note(&note.id).is_some());
    assert_eq!(view_changes(&actions), 1);
}

#[test]
fn add_mode_placement_respects_transform() {
    let mut core = engine();
    core.restore_view(ViewState {
        transform: CanvasTransform { scale: 2.0, offset_x: 100.0, offset_y: -50.0 },
        z_counter: 0,
    });
    core.enter_add_mode(NoteColor::Yellow);
    let actions = up(&mut core, pt(600.0, 250.0));
    let Some(Action::NoteCreated(note)) = actions.first() else {
        panic!("expected NoteCreated first, got {actions:?}");
    };
    assert!((note.x - 50.0).abs() < EPSILON);
    assert!((note.y - 0.0).abs() < EPSILON);
}

#[test]
fn ghost_follows_pointer_only_in_add_mode() {
    let mut core = engine();
    mv(&mut core, pt(450.0, 300.0));
    assert!(core.ghost().is_none());

    core.enter_add_mode(NoteColor::Green);
    mv(&mut core, pt(450.0, 320.0));
    assert_eq!(core.ghost(), Some(pt(50.0, 20.0)));
}

#[test]
fn escape_cancels_add_mode() {
    let mut core = engine();
    core.enter_add_mode(NoteColor::Pink);
    mv(&mut core, pt(10.0, 10.0));
    core.on_key_down(escape(), no_mods());
    assert_eq!(core.mode(), Mode::Idle);
    assert!(core.ghost().is_none());
    assert!(up(&mut core, pt(10.0, 10.0)).is_empty());
    assert!(core.notes().is_empty());
}

#[test]
fn z_counter_increments_per_placement() {
    let mut core = engine();
    for expected in 1..=3 {
        core.enter_add_mode(NoteColor::Yellow);
        let actions = up(&mut core, pt(0.0, 0.0));
        let Some(Action::NoteCreated(note)) = actions.first() else {
            panic!("expected NoteCreated");
        };
        assert_eq!(note.z_index, expected);
    }
}

// =============================================================
// Selection
// =============================================================

#[test]
fn click_selects_and_empty_click_deselects() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);

    let actions = down(&mut core, pt(150.0, 150.0));
    assert!(actions.contains(&Action::SelectionChanged(Some(id))));
    up(&mut core, pt(150.0, 150.0));
    assert_eq!(core.selection(), Some(id));
    assert_eq!(core.mode(), Mode::Idle);

    let actions = down(&mut core, pt(700.0, 500.0));
    assert!(actions.contains(&Action::SelectionChanged(None)));
    assert!(core.selection().is_none());
}

#[test]
fn click_without_movement_is_not_a_drag() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(150.0, 150.0));
    mv(&mut core, pt(152.0, 151.0));
    assert_eq!(core.mode(), Mode::Idle);
    let actions = up(&mut core, pt(152.0, 151.0));
    assert!(actions.is_empty());
    let note = core.note(&id).unwrap();
    assert_eq!((note.x, note.y), (-300.0, -200.0));
    assert_eq!(note.z_index, 1);
}

#[test]
fn escape_clears_selection() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(150.0, 150.0));
    up(&mut core, pt(150.0, 150.0));
    assert_eq!(core.selection(), Some(id));
    let actions = core.on_key_down(escape(), no_mods());
    assert!(actions.contains(&Action::SelectionChanged(None)));
}

#[test]
fn other_keys_are_ignored() {
    let mut core = engine();
    core.enter_add_mode(NoteColor::Yellow);
    assert!(core.on_key_down(Key("Enter".into()), no_mods()).is_empty());
    assert_eq!(core.mode(), Mode::Adding);
}

// =============================================================
// Dragging
// =============================================================

#[test]
fn drag_moves_note_by_screen_delta_over_scale() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    core.restore_view(ViewState { transform: CanvasTransform { scale: 2.0, ..Default::default() }, z_counter: 5 });
    let start = core.transform().canvas_to_screen(pt(-300.0, -200.0), pt(400.0, 300.0));
    let grab = pt(start.x + 10.0, start.y + 10.0);

    down(&mut core, grab);
    let actions = mv(&mut core, pt(grab.x + 40.0, grab.y - 20.0));
    assert_eq!(core.mode(), Mode::Dragging);
    assert!(actions.contains(&Action::NoteUpdated { id, fields: NotePatch::z_index(6) }));

    let note = core.note(&id).unwrap();
    assert!((note.x - (-280.0)).abs() < EPSILON);
    assert!((note.y - (-210.0)).abs() < EPSILON);
    assert_eq!(note.z_index, 6);
}

#[test]
fn drag_start_brings_note_to_front() {
    let mut core = engine();
    let low = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    let high = add_note_at_screen(&mut core, 300.0, 300.0, 2);
    core.restore_view(ViewState { transform: CanvasTransform::default(), z_counter: 2 });

    down(&mut core, pt(110.0, 110.0));
    mv(&mut core, pt(130.0, 130.0));
    up(&mut core, pt(130.0, 130.0));

    let order: Vec<NoteId> = core.notes().iter().map(|n| n.id).collect();
    assert_eq!(order, vec![high, low]);
}

#[test]
fn drag_emits_position_updates() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(150.0, 150.0));
    mv(&mut core, pt(160.0, 150.0));
    let actions = mv(&mut core, pt(170.0, 180.0));
    assert!(actions.contains(&Action::NoteUpdated { id, fields: NotePatch::position(-280.0, -170.0) }));
}

#[test]
fn drop_outside_trash_keeps_note() {
    let mut core = engine();
    core.set_trash_rect(Some(Rect::new(700.0, 500.0, 80.0, 80.0)));
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(150.0, 150.0));
    mv(&mut core, pt(200.0, 200.0));
    assert!(!core.over_trash());
    let actions = up(&mut core, pt(200.0, 200.0));
    assert!(!has_deleted(&actions, id));
    assert!(core.note(&id).is_some());
    assert_eq!(core.mode(), Mode::Idle);
}

#[test]
fn drop_on_trash_deletes_note() {
    let mut core = engine();
    core.set_trash_rect(Some(Rect::new(700.0, 500.0, 80.0, 80.0)));
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(110.0, 110.0));
    up(&mut core, pt(110.0, 110.0));
    assert_eq!(core.selection(), Some(id));

    down(&mut core, pt(110.0, 110.0));
    mv(&mut core, pt(650.0, 450.0));
    assert!(core.over_trash());
    let actions = up(&mut core, pt(650.0, 450.0));
    assert!(has_deleted(&actions, id));
    assert!(actions.contains(&Action::SelectionChanged(None)));
    assert!(core.note(&id).is_none());
    assert!(core.selection().is_none());
}

#[test]
fn trash_overlap_is_released_when_leaving() {
    let mut core = engine();
    core.set_trash_rect(Some(Rect::new(700.0, 500.0, 80.0, 80.0)));
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(110.0, 110.0));
    mv(&mut core, pt(650.0, 450.0));
    assert!(core.over_trash());
    mv(&mut core, pt(200.0, 200.0));
    assert!(!core.over_trash());
    let actions = up(&mut core, pt(200.0, 200.0));
    assert!(!has_deleted(&actions, id));
}

#[test]
fn escape_cancels_drag_and_restores_position() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(150.0, 150.0));
    mv(&mut core, pt(300.0, 300.0));
    let actions = core.on_key_down(escape(), no_mods());
    assert!(actions.contains(&Action::NoteUpdated { id, fields: NotePatch::position(-300.0, -200.0) }));
    assert_eq!(core.mode(), Mode::Idle);
    let note = core.note(&id).unwrap();
    assert_eq!((note.x, note.y), (-300.0, -200.0));
}

#[test]
fn note_locked_by_other_selects_but_does_not_drag() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    core.set_foreign_locks([id]);
    assert!(core.is_locked_by_other(&id));

    down(&mut core, pt(150.0, 150.0));
    assert_eq!(core.selection(), Some(id));
    mv(&mut core, pt(300.0, 300.0));
    assert_eq!(core.mode(), Mode::Idle);
    assert_eq!(core.note(&id).map(|n| (n.x, n.y)), Some((-300.0, -200.0)));
}

#[test]
fn snapshot_during_drag_keeps_local_position() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(150.0, 150.0));
    mv(&mut core, pt(250.0, 150.0));

    let mut stale = core.note(&id).cloned().unwrap();
    stale.x = -300.0;
    core.load_snapshot(vec![stale]);
    assert_eq!(core.note(&id).map(|n| n.x), Some(-200.0));
    assert_eq!(core.mode(), Mode::Dragging);
}

#[test]
fn snapshot_removing_dragged_note_ends_drag() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(150.0, 150.0));
    mv(&mut core, pt(250.0, 150.0));
    core.load_snapshot(Vec::new());
    assert_eq!(core.mode(), Mode::Idle);
    assert!(core.selection().is_none());
    assert!(core.note(&id).is_none());
}

// =============================================================
// Panning
// =============================================================

#[test]
fn secondary_drag_pans_by_raw_delta() {
    let mut core = engine();
    core.restore_view(ViewState { transform: CanvasTransform { scale: 0.5, ..Default::default() }, z_counter: 0 });
    core.on_pointer_down(pt(100.0, 100.0), Button::Secondary, no_mods());
    assert_eq!(core.mode(), Mode::Panning);
    mv(&mut core, pt(130.0, 90.0));
    mv(&mut core, pt(140.0, 80.0));
    let actions = core.on_pointer_up(pt(140.0, 80.0), Button::Secondary, no_mods());
    assert_eq!(view_changes(&actions), 1);
    assert_eq!(core.mode(), Mode::Idle);
    let t = core.transform();
    assert_eq!((t.offset_x, t.offset_y, t.scale), (40.0, -20.0, 0.5));
}

#[test]
fn panning_from_add_mode_resumes_add_mode() {
    let mut core = engine();
    core.enter_add_mode(NoteColor::Green);
    core.on_pointer_down(pt(0.0, 0.0), Button::Secondary, no_mods());
    mv(&mut core, pt(20.0, 0.0));
    core.on_pointer_up(pt(20.0, 0.0), Button::Secondary, no_mods());
    assert_eq!(core.mode(), Mode::Adding);

    let actions = up(&mut core, pt(420.0, 300.0));
    let Some(Action::NoteCreated(note)) = actions.first() else {
        panic!("expected NoteCreated");
    };
    assert_eq!(note.color, NoteColor::Green);
    assert!((note.x - 0.0).abs() < EPSILON);
}

#[test]
fn secondary_press_during_drag_pans_and_drops_in_place() {
    let mut core = engine();
    core.set_trash_rect(Some(Rect::new(700.0, 500.0, 80.0, 80.0)));
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    down(&mut core, pt(110.0, 110.0));
    mv(&mut core, pt(650.0, 450.0));
    assert!(core.over_trash());

    core.on_pointer_down(pt(650.0, 450.0), Button::Secondary, no_mods());
    assert_eq!(core.mode(), Mode::Panning);
    assert!(!core.over_trash());
    mv(&mut core, pt(600.0, 430.0));
    let note = core.note(&id).expect("note kept");
    assert_eq!((note.x, note.y), (240.0, 140.0));

    assert!(!has_deleted(&up(&mut core, pt(600.0, 430.0)), id));
    assert_eq!(core.mode(), Mode::Panning);
    core.on_pointer_up(pt(600.0, 430.0), Button::Secondary, no_mods());
    assert_eq!(core.mode(), Mode::Idle);
    let t = core.transform();
    assert_eq!((t.offset_x, t.offset_y), (-50.0, -20.0));
    assert!(core.note(&id).is_some());
}

#[test]
fn pointer_move_always_reports_canvas_cursor() {
    let mut core = engine();
    let actions = mv(&mut core, pt(500.0, 400.0));
    assert_eq!(actions.first(), Some(&Action::CursorMoved(pt(100.0, 100.0))));
}

// =============================================================
// Zoom
// =============================================================

#[test]
fn wheel_up_zooms_in_at_pointer() {
    let mut core = engine();
    let anchor = pt(600.0, 200.0);
    let before = core.transform().screen_to_canvas(anchor, pt(400.0, 300.0));
    let actions = core.on_wheel(anchor, WheelDelta { dx: 0.0, dy: -100.0 }, no_mods());
    assert_eq!(view_changes(&actions), 1);
    assert!((core.transform().scale - 1.1).abs() < EPSILON);
    let after = core.transform().screen_to_canvas(anchor, pt(400.0, 300.0));
    assert!((before.x - after.x).abs() < EPSILON && (before.y - after.y).abs() < EPSILON);
}

#[test]
fn wheel_down_zooms_out() {
    let mut core = engine();
    core.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 0.0, dy: 3.0 }, no_mods());
    assert!((core.transform().scale - 1.0 / 1.1).abs() < EPSILON);
}

#[test]
fn wheel_at_max_scale_emits_nothing() {
    let mut core = engine();
    core.restore_view(ViewState { transform: CanvasTransform { scale: 2.0, ..Default::default() }, z_counter: 0 });
    let actions = core.on_wheel(pt(10.0, 10.0), WheelDelta { dx: 0.0, dy: -1.0 }, no_mods());
    assert!(actions.is_empty());
}

#[test]
fn horizontal_only_wheel_is_ignored() {
    let mut core = engine();
    assert!(core.on_wheel(pt(10.0, 10.0), WheelDelta { dx: 5.0, dy: 0.0 }, no_mods()).is_empty());
}

#[test]
fn button_zoom_uses_center_and_larger_step() {
    let mut core = engine();
    core.zoom_in();
    let t = core.transform();
    assert!((t.scale - 1.2).abs() < EPSILON);
    assert!(t.offset_x.abs() < EPSILON && t.offset_y.abs() < EPSILON);
    core.zoom_out();
    assert!((core.transform().scale - 1.0).abs() < EPSILON);
}

#[test]
fn reset_view_restores_default() {
    let mut core = engine();
    core.zoom_in();
    core.on_pointer_down(pt(0.0, 0.0), Button::Secondary, no_mods());
    mv(&mut core, pt(50.0, 50.0));
    core.on_pointer_up(pt(50.0, 50.0), Button::Secondary, no_mods());
    let actions = core.reset_view();
    assert_eq!(view_changes(&actions), 1);
    assert_eq!(core.transform(), CanvasTransform::default());
    assert!(core.reset_view().is_empty());
}

#[test]
fn fit_to_content_frames_notes() {
    let mut core = engine();
    core.doc.insert(Note::new(0.0, 0.0, NoteColor::Yellow, 1));
    core.doc.insert(Note::new(1000.0, 0.0, NoteColor::Yellow, 2));
    core.fit_to_content();
    // Padded box 1300x300 in 800x600 → 800/1300.
    assert!((core.transform().scale - 800.0 / 1300.0).abs() < EPSILON);
}

// =============================================================
// Editing
// =============================================================

#[test]
fn edit_note_updates_cache() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    let patch = NotePatch { title: Some("Plan".into()), ..Default::default() };
    let actions = core.edit_note(&id, patch.clone());
    assert!(actions.contains(&Action::NoteUpdated { id, fields: patch }));
    assert_eq!(core.note(&id).map(|n| n.title.as_str()), Some("Plan"));
}

#[test]
fn edit_note_locked_by_other_is_dropped() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 100.0, 100.0, 1);
    core.set_foreign_locks([id]);
    let patch = NotePatch { content: Some("mine".into()), ..Default::default() };
    assert!(core.edit_note(&id, patch).is_empty());
    assert_eq!(core.note(&id).map(|n| n.content.as_str()), Some(""));
}

// =============================================================
// Direct host commands
// =============================================================

#[test]
fn place_note_at_uses_canvas_coordinates_and_selects() {
    let mut core = engine();
    core.transform = CanvasTransform { scale: 2.0, offset_x: 100.0, offset_y: 0.0 };
    let actions = core.place_note_at(pt(15.0, -5.0), NoteColor::Green);

    let Some(Action::NoteCreated(note)) = actions.first() else {
        panic!("expected NoteCreated first, got {actions:?}");
    };
    assert_eq!((note.x, note.y), (15.0, -5.0));
    assert_eq!(note.z_index, 1);
    assert_eq!(core.selection(), Some(note.id));
    assert_eq!(view_changes(&actions), 1);
    assert_eq!(core.mode(), Mode::Idle);
}

#[test]
fn delete_note_removes_and_clears_selection() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 300.0, 300.0, 1);
    down(&mut core, pt(310.0, 310.0));
    assert_eq!(core.selection(), Some(id));

    let actions = core.delete_note(&id);
    assert!(has_deleted(&actions, id));
    assert!(actions.contains(&Action::SelectionChanged(None)));
    assert!(core.note(&id).is_none());
    assert!(mv(&mut core, pt(400.0, 400.0)).iter().all(|a| matches!(a, Action::CursorMoved(_))));
}

#[test]
fn delete_note_refused_when_locked_by_other() {
    let mut core = engine();
    let id = add_note_at_screen(&mut core, 300.0, 300.0, 1);
    core.set_foreign_locks([id]);
    assert!(core.delete_note(&id).is_empty());
    assert!(core.note(&id).is_some());
    assert!(core.delete_note(&NoteId::new_v4()).is_empty());
}
