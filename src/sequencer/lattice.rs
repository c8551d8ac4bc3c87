/// Pitch lattice - one pitch name per grid row, highest pitch first
use crate::midi::midi_note_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchLattice {
    names: Vec<String>,
    notes: Vec<u8>,
}

impl PitchLattice {
    /// Builds `octaves` full octaves starting at C of `lowest_octave`.
    ///
    /// Returns `None` when the range leaves MIDI note space (C-1 ..= G9) or
    /// `octaves` is zero.
    pub fn new(lowest_octave: i8, octaves: u8) -> Option<Self> {
        if octaves == 0 {
            return None;
        }
        let lowest = (lowest_octave as i32 + 1) * 12;
        let highest = lowest + 12 * octaves as i32 - 1;
        if lowest < 0 || highest > 127 {
            return None;
        }

        let notes: Vec<u8> = (lowest..=highest).rev().map(|n| n as u8).collect();
        let names = notes.iter().map(|n| midi_note_name(*n)).collect();
        Some(Self { names, notes })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&str> {
        self.names.get(row).map(String::as_str)
    }

    pub fn midi_note(&self, row: usize) -> Option<u8> {
        self.notes.get(row).copied()
    }

    pub fn row_of(&self, pitch: &str) -> Option<usize> {
        self.names.iter().position(|name| name == pitch)
    }

    pub fn contains(&self, pitch: &str) -> bool {
        self.row_of(pitch).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for PitchLattice {
    /// C3 up to B5.
    fn default() -> Self {
        let lowest = 48u8;
        let notes: Vec<u8> = (lowest..lowest + 36).rev().collect();
        let names = notes.iter().map(|n| midi_note_name(*n)).collect();
        Self { names, notes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_run_from_highest_to_lowest() {
        let lattice = PitchLattice::new(4, 1).unwrap();
        assert_eq!(lattice.len(), 12);
        assert_eq!(lattice.get(0), Some("B4"));
        assert_eq!(lattice.get(11), Some("C4"));
        assert_eq!(lattice.midi_note(11), Some(60));
        assert_eq!(lattice.get(12), None);
    }

    #[test]
    fn length_is_twelve_per_octave() {
        for octaves in 1..=5u8 {
            let lattice = PitchLattice::new(2, octaves).unwrap();
            assert_eq!(lattice.len(), 12 * octaves as usize);
        }
    }

    #[test]
    fn out_of_midi_range_is_rejected() {
        assert!(PitchLattice::new(4, 0).is_none());
        assert!(PitchLattice::new(-2, 1).is_none());
        assert!(PitchLattice::new(9, 1).is_none());
        assert!(PitchLattice::new(-1, 10).is_some());
    }

    #[test]
    fn default_matches_explicit_construction() {
        assert_eq!(PitchLattice::default(), PitchLattice::new(3, 3).unwrap());
    }

    #[test]
    fn row_lookup_inverts_get() {
        let lattice = PitchLattice::default();
        for (row, name) in lattice.iter().enumerate() {
            assert_eq!(lattice.row_of(name), Some(row));
        }
        assert!(!lattice.contains("C9"));
    }
}
