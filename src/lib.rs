//! notegrid - a grid note editor
//!
//! This library provides the pieces of a pitch/time note grid:
//! - Note storage, selection and pointer interaction
//! - Playback scheduling against a transport clock
//! - Audio output through a built-in synth or a MIDI port
//! - A cached two-layer renderer for any drawing surface

pub mod audio;
pub mod config;
pub mod midi;
pub mod render;
pub mod sequencer;

// Re-export commonly used types
pub use audio::{AudioEngine, EngineError, MidiEngine, OfflineEngine, SynthEngine, Transport};
pub use config::{ConfigError, EditorConfig};
pub use midi::{midi_note_name, MidiOutputDevice};
pub use render::{RenderPipeline, Surface, Theme};
pub use sequencer::geometry::GridGeometry;
pub use sequencer::interaction::{InteractionController, PreviewPolicy, Redraw};
pub use sequencer::playback::{PlayOutcome, PlaybackError, PlaybackScheduler};
pub use sequencer::{Note, NoteId, NoteStore};
