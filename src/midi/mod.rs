/// Pitch naming and MIDI output using midir
use midir::{MidiOutput, MidiOutputConnection};
use tracing::warn;

use crate::audio::{EngineError, VoiceSink};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
    port_name: Option<String>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
            port_name: None,
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new("notegrid MIDI Output") {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), EngineError> {
        let midi_out = MidiOutput::new("notegrid MIDI Output")
            .map_err(|e| EngineError::Device(format!("failed to create MIDI output: {e}")))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| EngineError::Device(format!("invalid MIDI port index {port_index}")))?;
        let name = midi_out.port_name(port).ok();

        let connection = midi_out
            .connect(port, "notegrid")
            .map_err(|e| EngineError::Device(format!("failed to connect: {e}")))?;

        self.connection = Some(connection);
        self.port_name = name;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<(), EngineError> {
        self.send(&[0x90, note & 0x7f, velocity & 0x7f])
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<(), EngineError> {
        self.send(&[0x80, note & 0x7f, 0])
    }

    pub fn disconnect(&mut self) {
        self.connection = None;
        self.port_name = None;
    }

    fn send(&mut self, message: &[u8]) -> Result<(), EngineError> {
        match self.connection.as_mut() {
            Some(conn) => conn
                .send(message)
                .map_err(|e| EngineError::Device(format!("failed to send MIDI message: {e}"))),
            None => Err(EngineError::NotReady),
        }
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceSink for MidiOutputDevice {
    fn is_ready(&self) -> bool {
        self.is_connected()
    }

    fn open(&mut self) -> Result<(), EngineError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(EngineError::NotReady)
        }
    }

    fn note_on(&mut self, note: u8) {
        if let Err(err) = self.send_note_on(note, 100) {
            warn!(%err, note, "MIDI note on dropped");
        }
    }

    fn note_off(&mut self, note: u8) {
        if let Err(err) = self.send_note_off(note) {
            warn!(%err, note, "MIDI note off dropped");
        }
    }

    fn all_notes_off(&mut self) {
        // CC 123 (all notes off) on channel 1
        if let Err(err) = self.send(&[0xb0, 123, 0]) {
            warn!(%err, "MIDI all notes off dropped");
        }
    }
}

/// Scientific pitch name for a MIDI note number, e.g. 60 -> "C4".
pub fn midi_note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Parses a pitch name such as "C4", "F#3" or "Bb-1" into a MIDI note number.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = &name[letter.len_utf8()..];
    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave_str.parse().ok()?;

    let note = (octave + 1) * 12 + base + accidental;
    u8::try_from(note).ok().filter(|n| *n <= 127)
}

pub fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_scientific_pitch() {
        assert_eq!(midi_note_name(60), "C4");
        assert_eq!(midi_note_name(61), "C#4");
        assert_eq!(midi_note_name(0), "C-1");
        assert_eq!(midi_note_name(127), "G9");
    }

    #[test]
    fn parse_accepts_sharps_flats_and_negative_octaves() {
        assert_eq!(parse_note_name("C4"), Some(60));
        assert_eq!(parse_note_name("C#4"), Some(61));
        assert_eq!(parse_note_name("Db4"), Some(61));
        assert_eq!(parse_note_name("C-1"), Some(0));
        assert_eq!(parse_note_name("G9"), Some(127));
    }

    #[test]
    fn parse_rejects_garbage_and_out_of_range() {
        assert_eq!(parse_note_name(""), None);
        assert_eq!(parse_note_name("H2"), None);
        assert_eq!(parse_note_name("C"), None);
        assert_eq!(parse_note_name("G#9"), None);
        assert_eq!(parse_note_name("Cb-1"), None);
    }

    #[test]
    fn names_parse_back() {
        for note in 0..=127u8 {
            assert_eq!(parse_note_name(&midi_note_name(note)), Some(note));
        }
    }

    #[test]
    fn a4_is_concert_pitch() {
        assert!((midi_note_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((midi_note_to_frequency(81) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn disconnected_device_is_not_ready() {
        let mut device = MidiOutputDevice::new();
        assert!(!VoiceSink::is_ready(&device));
        assert!(matches!(device.open(), Err(EngineError::NotReady)));
        assert!(matches!(device.send_note_on(60, 100), Err(EngineError::NotReady)));
    }
}
