//! Core editor logic - placed notes and the single selection
//! Rows map to pitch through the lattice; columns are time.

pub mod geometry;
pub mod interaction;
pub mod lattice;
pub mod playback;

use lattice::PitchLattice;

pub type NoteId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    id: NoteId,
    pitch: String,
    row_index: usize,
    start_column: u32,
    duration_columns: u32,
    selected: bool,
}

impl Note {
    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn pitch(&self) -> &str {
        &self.pitch
    }

    pub fn row_index(&self) -> usize {
        self.row_index
    }

    /// Column cache used for hit-testing and drawing; always the start column.
    pub fn col_index(&self) -> u32 {
        self.start_column
    }

    pub fn start_column(&self) -> u32 {
        self.start_column
    }

    pub fn duration_columns(&self) -> u32 {
        self.duration_columns
    }

    /// First column after the note.
    pub fn end_column(&self) -> u32 {
        self.start_column.saturating_add(self.duration_columns)
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn covers(&self, row: usize, col: u32) -> bool {
        self.row_index == row && col >= self.start_column && col < self.end_column()
    }
}

/// Owns every placed note. Order is creation order.
#[derive(Debug, Clone)]
pub struct NoteStore {
    lattice: PitchLattice,
    notes: Vec<Note>,
    selected: Option<NoteId>,
    next_id: NoteId,
    revision: u64,
}

impl NoteStore {
    pub fn new(lattice: PitchLattice) -> Self {
        Self {
            lattice,
            notes: Vec::new(),
            selected: None,
            next_id: 1,
            revision: 0,
        }
    }

    pub fn lattice(&self) -> &PitchLattice {
        &self.lattice
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn selected(&self) -> Option<&Note> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn selected_id(&self) -> Option<NoteId> {
        self.selected
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// First note in store order covering the cell.
    pub fn hit_test(&self, row: usize, col: u32) -> Option<NoteId> {
        self.notes.iter().find(|n| n.covers(row, col)).map(|n| n.id)
    }

    pub fn select_only(&mut self, id: NoteId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        if self.selected == Some(id) {
            return true;
        }
        for note in &mut self.notes {
            note.selected = note.id == id;
        }
        self.selected = Some(id);
        self.touch();
        true
    }

    pub fn clear_selection(&mut self) {
        if self.selected.take().is_some() {
            for note in &mut self.notes {
                note.selected = false;
            }
            self.touch();
        }
    }

    /// Appends a one-column note at the cell and makes it the selection.
    /// Rows outside the lattice are ignored.
    pub fn create_note(&mut self, row: usize, col: u32) -> Option<NoteId> {
        let pitch = self.lattice.get(row)?.to_string();
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);

        for note in &mut self.notes {
            note.selected = false;
        }
        self.notes.push(Note {
            id,
            pitch,
            row_index: row,
            start_column: col,
            duration_columns: 1,
            selected: true,
        });
        self.selected = Some(id);
        self.touch();
        Some(id)
    }

    /// Moves a note in place. Overlap with other notes is allowed.
    pub fn move_note(&mut self, id: NoteId, row: usize, col: u32) -> bool {
        let Some(pitch) = self.lattice.get(row) else {
            return false;
        };
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if note.row_index == row && note.start_column == col {
            return true;
        }
        note.row_index = row;
        note.start_column = col;
        note.pitch = pitch.to_string();
        self.touch();
        true
    }

    /// Sets a note's length in columns (at least one).
    pub fn set_duration(&mut self, id: NoteId, columns: u32) -> bool {
        let columns = columns.max(1);
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if note.duration_columns != columns {
            note.duration_columns = columns;
            self.touch();
        }
        true
    }

    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let index = self.notes.iter().position(|n| n.id == id)?;
        let removed = self.notes.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.touch();
        Some(removed)
    }

    /// Last occupied column boundary, `None` for an empty store.
    pub fn max_occupied_column(&self) -> Option<u32> {
        self.notes.iter().map(Note::end_column).max()
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::new(PitchLattice::default())
    }
}
