/// Pointer interaction - turns pointer events into note edits and previews
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geometry::GridGeometry;
use super::{NoteId, NoteStore};
use crate::audio::AudioEngine;

/// What happens to the tone played when a note is placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PreviewPolicy {
    /// Attack only; the tone holds until something else releases it.
    Sustain,
    /// Attack, then release after a fixed interval.
    AutoRelease { seconds: f64 },
}

impl Default for PreviewPolicy {
    fn default() -> Self {
        PreviewPolicy::AutoRelease { seconds: 0.3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerState {
    Idle,
    Dragging { note: NoteId },
}

/// Layers a handler invalidated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Redraw {
    pub notes: bool,
    pub grid: bool,
}

impl Redraw {
    pub const NONE: Redraw = Redraw {
        notes: false,
        grid: false,
    };

    pub fn notes() -> Self {
        Redraw {
            notes: true,
            grid: false,
        }
    }

    pub fn any(self) -> bool {
        self.notes || self.grid
    }

    pub fn merge(self, other: Redraw) -> Redraw {
        Redraw {
            notes: self.notes || other.notes,
            grid: self.grid || other.grid,
        }
    }
}

/// Pitches currently held by a key press or a placement preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivePitches(BTreeSet<String>);

impl ActivePitches {
    pub fn insert(&mut self, pitch: &str) -> bool {
        self.0.insert(pitch.to_string())
    }

    pub fn remove(&mut self, pitch: &str) -> bool {
        self.0.remove(pitch)
    }

    pub fn contains(&self, pitch: &str) -> bool {
        self.0.contains(pitch)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct PendingPreview {
    pitch: String,
    deadline: Instant,
}

pub struct InteractionController {
    store: NoteStore,
    geometry: GridGeometry,
    state: PointerState,
    active: ActivePitches,
    preview: PreviewPolicy,
    pending_previews: Vec<PendingPreview>,
}

impl InteractionController {
    /// The grid gets one row per lattice pitch regardless of `geometry.rows()`.
    pub fn new(store: NoteStore, geometry: GridGeometry, preview: PreviewPolicy) -> Self {
        let geometry = GridGeometry::new(
            geometry.cell_size(),
            store.lattice().len(),
            geometry.columns(),
            geometry.growth(),
        );
        Self {
            store,
            geometry,
            state: PointerState::Idle,
            active: ActivePitches::default(),
            preview,
            pending_previews: Vec::new(),
        }
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, PointerState::Dragging { .. })
    }

    pub fn dragged_note(&self) -> Option<NoteId> {
        match self.state {
            PointerState::Dragging { note } => Some(note),
            PointerState::Idle => None,
        }
    }

    pub fn active_pitches(&self) -> &ActivePitches {
        &self.active
    }

    pub fn preview_policy(&self) -> PreviewPolicy {
        self.preview
    }

    pub fn on_pointer_down(&mut self, x: f32, y: f32) -> Redraw {
        let Some((row, col)) = self.geometry.cell_at(x, y) else {
            debug!(x, y, "pointer down outside grid");
            return Redraw::NONE;
        };
        match self.store.hit_test(row, col) {
            Some(id) => {
                let redraw = self.select(id);
                self.state = PointerState::Dragging { note: id };
                redraw
            }
            None => Redraw::NONE,
        }
    }

    pub fn on_click(&mut self, x: f32, y: f32, engine: &mut dyn AudioEngine) -> Redraw {
        let Some((row, col)) = self.geometry.cell_at(x, y) else {
            debug!(x, y, "click outside grid");
            return Redraw::NONE;
        };
        if let Some(id) = self.store.hit_test(row, col) {
            return self.select(id);
        }
        if self.is_dragging() {
            return Redraw::NONE;
        }

        let Some(id) = self.store.create_note(row, col) else {
            return Redraw::NONE;
        };
        if let Some(pitch) = self.store.get(id).map(|n| n.pitch().to_string()) {
            self.start_preview(&pitch, engine);
        }
        let grid = self.geometry.grow_for(col);
        if grid {
            debug!(columns = self.geometry.columns(), "grid grown");
        }
        Redraw { notes: true, grid }
    }

    pub fn on_pointer_move(&mut self, x: f32, y: f32) -> Redraw {
        let PointerState::Dragging { note } = self.state else {
            return Redraw::NONE;
        };
        if !x.is_finite() || !y.is_finite() {
            return Redraw::NONE;
        }
        let (row, col) = self.geometry.pixel_to_cell(x, y);
        let (row, col) = self.geometry.clamp_cell(row, col);

        let revision = self.store.revision();
        if !self.store.move_note(note, row, col) {
            // the note is gone
            self.state = PointerState::Idle;
            return Redraw::NONE;
        }
        Redraw {
            notes: self.store.revision() != revision,
            grid: false,
        }
    }

    pub fn on_pointer_up(&mut self) -> Redraw {
        self.state = PointerState::Idle;
        Redraw::NONE
    }

    pub fn on_pointer_leave(&mut self) -> Redraw {
        self.state = PointerState::Idle;
        Redraw::NONE
    }

    /// Removes the selected note, ending a drag of it.
    pub fn delete_selected(&mut self) -> Redraw {
        let Some(id) = self.store.selected_id() else {
            return Redraw::NONE;
        };
        self.store.remove_note(id);
        if self.dragged_note() == Some(id) {
            self.state = PointerState::Idle;
        }
        Redraw::notes()
    }

    /// Lengthens or shortens the selected note; never below one column.
    pub fn resize_selected(&mut self, delta: i32) -> Redraw {
        let Some(note) = self.store.selected() else {
            return Redraw::NONE;
        };
        let id = note.id();
        let columns = note.duration_columns().saturating_add_signed(delta).max(1);
        let revision = self.store.revision();
        self.store.set_duration(id, columns);
        Redraw {
            notes: self.store.revision() != revision,
            grid: false,
        }
    }

    /// Piano strip key down.
    pub fn press_key(&mut self, pitch: &str, engine: &mut dyn AudioEngine) -> bool {
        if !self.store.lattice().contains(pitch) {
            return false;
        }
        if let Err(err) = engine.attack(pitch) {
            debug!(%err, pitch, "key attack dropped");
        }
        // the key now owns the pitch; a pending preview must not release it
        self.pending_previews.retain(|p| p.pitch != pitch);
        self.active.insert(pitch)
    }

    /// Piano strip key up.
    pub fn release_key(&mut self, pitch: &str, engine: &mut dyn AudioEngine) -> bool {
        if !self.active.remove(pitch) {
            return false;
        }
        self.pending_previews.retain(|p| p.pitch != pitch);
        if let Err(err) = engine.release(pitch) {
            debug!(%err, pitch, "key release dropped");
        }
        true
    }

    /// Releases placement previews whose interval has run out.
    pub fn release_expired_previews(&mut self, now: Instant, engine: &mut dyn AudioEngine) -> usize {
        let (expired, pending): (Vec<_>, Vec<_>) = self
            .pending_previews
            .drain(..)
            .partition(|p| p.deadline <= now);
        self.pending_previews = pending;

        for preview in &expired {
            self.active.remove(&preview.pitch);
            if let Err(err) = engine.release(&preview.pitch) {
                debug!(%err, pitch = %preview.pitch, "preview release dropped");
            }
        }
        expired.len()
    }

    /// Forgets every held pitch and pending preview after the engine was
    /// silenced with `release_all`. Returns false when nothing was held.
    pub fn clear_active_pitches(&mut self) -> bool {
        self.pending_previews.clear();
        if self.active.is_empty() {
            return false;
        }
        self.active.clear();
        true
    }

    fn select(&mut self, id: NoteId) -> Redraw {
        let revision = self.store.revision();
        self.store.select_only(id);
        Redraw {
            notes: self.store.revision() != revision,
            grid: false,
        }
    }

    fn start_preview(&mut self, pitch: &str, engine: &mut dyn AudioEngine) {
        if let Err(err) = engine.attack(pitch) {
            debug!(%err, pitch, "preview attack dropped");
            return;
        }
        self.active.insert(pitch);
        if let PreviewPolicy::AutoRelease { seconds } = self.preview {
            let hold = Duration::from_secs_f64(seconds.max(0.0));
            self.pending_previews.retain(|p| p.pitch != pitch);
            self.pending_previews.push(PendingPreview {
                pitch: pitch.to_string(),
                deadline: Instant::now() + hold,
            });
        }
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(
            NoteStore::default(),
            GridGeometry::default(),
            PreviewPolicy::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EngineCall, OfflineEngine};

    const CELL: f32 = 24.0;

    fn controller(preview: PreviewPolicy) -> InteractionController {
        InteractionController::new(
            NoteStore::default(),
            GridGeometry::new(CELL, 0, 64, 50),
            preview,
        )
    }

    fn centre(row: usize, col: u32) -> (f32, f32) {
        (col as f32 * CELL + CELL / 2.0, row as f32 * CELL + CELL / 2.0)
    }

    #[test]
    fn click_on_empty_grid_creates_selected_note_and_previews() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();

        let redraw = ctl.on_click(0.0, 0.0, &mut engine);
        assert!(redraw.notes);
        assert!(!redraw.grid);

        let note = &ctl.store().notes()[0];
        assert_eq!(note.row_index(), 0);
        assert_eq!(note.col_index(), 0);
        assert_eq!(Some(note.pitch()), ctl.store().lattice().get(0));
        assert!(note.is_selected());
        assert_eq!(engine.calls(), &[EngineCall::Attack(note.pitch().to_string())]);
        assert!(ctl.active_pitches().contains(note.pitch()));
    }

    #[test]
    fn click_on_existing_note_only_selects() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        let (x, y) = centre(2, 2);
        ctl.on_click(x, y, &mut engine);
        let (x2, y2) = centre(5, 5);
        ctl.on_click(x2, y2, &mut engine);
        engine.take_calls();

        let redraw = ctl.on_click(x, y, &mut engine);
        assert!(redraw.notes);
        assert_eq!(ctl.store().len(), 2);
        assert_eq!(ctl.store().selected().unwrap().row_index(), 2);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn clicks_outside_the_grid_are_ignored() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        let below = ctl.geometry().height() + 1.0;
        assert_eq!(ctl.on_click(10.0, below, &mut engine), Redraw::NONE);
        assert_eq!(ctl.on_click(-5.0, 10.0, &mut engine), Redraw::NONE);
        assert_eq!(ctl.on_pointer_down(10.0, below), Redraw::NONE);
        assert!(ctl.store().is_empty());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn pointer_down_on_empty_space_stays_idle() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let (x, y) = centre(1, 1);
        ctl.on_pointer_down(x, y);
        assert_eq!(ctl.state(), PointerState::Idle);
        assert!(ctl.store().is_empty());
    }

    #[test]
    fn drag_moves_the_same_note_on_every_event() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        let (x, y) = centre(4, 3);
        ctl.on_click(x, y, &mut engine);
        let id = ctl.store().notes()[0].id();

        ctl.on_pointer_down(x, y);
        assert_eq!(ctl.state(), PointerState::Dragging { note: id });

        for col in 4..=10 {
            let (mx, my) = centre(4, col);
            let redraw = ctl.on_pointer_move(mx, my);
            assert!(redraw.notes);
            assert_eq!(ctl.store().len(), 1);
            let note = ctl.store().get(id).unwrap();
            assert_eq!(note.col_index(), col);
            assert_eq!(note.row_index(), 4);
        }

        // same cell again: nothing to repaint
        let (mx, my) = centre(4, 10);
        assert_eq!(ctl.on_pointer_move(mx + 1.0, my), Redraw::NONE);

        ctl.on_pointer_up();
        assert_eq!(ctl.state(), PointerState::Idle);
        assert_eq!(ctl.dragged_note(), None);
    }

    #[test]
    fn drag_outside_the_lattice_is_clamped() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        let (x, y) = centre(1, 1);
        ctl.on_click(x, y, &mut engine);
        ctl.on_pointer_down(x, y);

        ctl.on_pointer_move(x, -100.0);
        assert_eq!(ctl.store().notes()[0].row_index(), 0);

        let last = ctl.store().lattice().len() - 1;
        ctl.on_pointer_move(-50.0, ctl.geometry().height() + 500.0);
        let note = &ctl.store().notes()[0];
        assert_eq!(note.row_index(), last);
        assert_eq!(note.col_index(), 0);
        assert_eq!(Some(note.pitch()), ctl.store().lattice().get(last));
    }

    #[test]
    fn move_without_drag_does_nothing() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        ctl.on_click(0.0, 0.0, &mut engine);
        let (x, y) = centre(3, 3);
        assert_eq!(ctl.on_pointer_move(x, y), Redraw::NONE);
        assert_eq!(ctl.store().notes()[0].col_index(), 0);
    }

    #[test]
    fn pointer_leave_ends_the_drag() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        ctl.on_click(0.0, 0.0, &mut engine);
        ctl.on_pointer_down(0.0, 0.0);
        assert!(ctl.is_dragging());
        ctl.on_pointer_leave();
        assert!(!ctl.is_dragging());
    }

    #[test]
    fn click_while_dragging_does_not_create() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        ctl.on_click(0.0, 0.0, &mut engine);
        ctl.on_pointer_down(0.0, 0.0);
        let (x, y) = centre(6, 6);
        ctl.on_click(x, y, &mut engine);
        assert_eq!(ctl.store().len(), 1);
    }

    #[test]
    fn creating_at_last_column_grows_grid_by_fifty() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        let (x, y) = centre(2, 5);
        ctl.on_click(x, y, &mut engine);
        let before: Vec<_> = ctl.store().notes().to_vec();

        let last = ctl.geometry().columns() - 1;
        let (x, y) = centre(0, last);
        let redraw = ctl.on_click(x, y, &mut engine);
        assert!(redraw.grid);
        assert_eq!(ctl.geometry().columns(), 64 + 50);

        let existing = ctl.store().get(before[0].id()).unwrap();
        assert_eq!(existing.row_index(), before[0].row_index());
        assert_eq!(existing.col_index(), before[0].col_index());
    }

    #[test]
    fn locked_engine_does_not_block_editing() {
        let mut ctl = controller(PreviewPolicy::default());
        let mut engine = OfflineEngine::locked();
        let redraw = ctl.on_click(0.0, 0.0, &mut engine);
        assert!(redraw.notes);
        assert_eq!(ctl.store().len(), 1);
        assert!(ctl.active_pitches().is_empty());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn auto_release_preview_stops_after_interval() {
        let mut ctl = controller(PreviewPolicy::AutoRelease { seconds: 0.3 });
        let mut engine = OfflineEngine::new();
        ctl.on_click(0.0, 0.0, &mut engine);
        let pitch = ctl.store().notes()[0].pitch().to_string();

        assert_eq!(ctl.release_expired_previews(Instant::now(), &mut engine), 0);
        assert!(ctl.active_pitches().contains(&pitch));

        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(ctl.release_expired_previews(later, &mut engine), 1);
        assert!(ctl.active_pitches().is_empty());
        assert_eq!(engine.calls().last(), Some(&EngineCall::Release(pitch)));
        assert!(engine.sounding().is_empty());
    }

    #[test]
    fn sustained_preview_is_never_released() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        ctl.on_click(0.0, 0.0, &mut engine);
        let later = Instant::now() + Duration::from_secs(60);
        assert_eq!(ctl.release_expired_previews(later, &mut engine), 0);
        assert_eq!(engine.sounding().len(), 1);
    }

    #[test]
    fn piano_keys_track_active_pitches() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        assert!(ctl.press_key("C4", &mut engine));
        assert!(ctl.active_pitches().contains("C4"));
        assert!(!ctl.press_key("C9", &mut engine));

        assert!(ctl.release_key("C4", &mut engine));
        assert!(!ctl.release_key("C4", &mut engine));
        assert!(ctl.active_pitches().is_empty());
        assert_eq!(
            engine.calls(),
            &[
                EngineCall::Attack("C4".into()),
                EngineCall::Release("C4".into())
            ]
        );
    }

    #[test]
    fn held_key_outlives_a_preview_of_the_same_pitch() {
        let mut ctl = controller(PreviewPolicy::AutoRelease { seconds: 0.3 });
        let mut engine = OfflineEngine::new();
        ctl.on_click(0.0, 0.0, &mut engine);
        let pitch = ctl.store().notes()[0].pitch().to_string();
        ctl.press_key(&pitch, &mut engine);

        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(ctl.release_expired_previews(later, &mut engine), 0);
        assert!(ctl.active_pitches().contains(&pitch));
        assert!(engine.sounding().contains(&pitch));

        assert!(ctl.release_key(&pitch, &mut engine));
        assert!(engine.sounding().is_empty());
    }

    #[test]
    fn clearing_active_pitches_drops_pending_previews() {
        let mut ctl = controller(PreviewPolicy::AutoRelease { seconds: 0.3 });
        let mut engine = OfflineEngine::new();
        assert!(!ctl.clear_active_pitches());

        ctl.on_click(0.0, 0.0, &mut engine);
        ctl.press_key("C4", &mut engine);
        assert!(ctl.clear_active_pitches());
        assert!(ctl.active_pitches().is_empty());

        engine.take_calls();
        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(ctl.release_expired_previews(later, &mut engine), 0);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn resizing_the_selection_never_drops_below_one_column() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        assert_eq!(ctl.resize_selected(1), Redraw::NONE);

        ctl.on_click(0.0, 0.0, &mut engine);
        assert!(ctl.resize_selected(2).notes);
        assert_eq!(ctl.store().notes()[0].duration_columns(), 3);
        let (x, y) = centre(0, 2);
        assert_eq!(ctl.on_click(x, y, &mut engine), Redraw::NONE);
        assert_eq!(ctl.store().len(), 1);

        ctl.resize_selected(-10);
        assert_eq!(ctl.store().notes()[0].duration_columns(), 1);
    }

    #[test]
    fn deleting_the_dragged_note_ends_the_drag() {
        let mut ctl = controller(PreviewPolicy::Sustain);
        let mut engine = OfflineEngine::new();
        ctl.on_click(0.0, 0.0, &mut engine);
        ctl.on_pointer_down(0.0, 0.0);
        assert!(ctl.delete_selected().notes);
        assert!(ctl.store().is_empty());
        assert!(!ctl.is_dragging());
        assert_eq!(ctl.delete_selected(), Redraw::NONE);
    }
}
