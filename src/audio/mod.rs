//! Audio engine contracts and their implementations
//!
//! The editor core never talks to a device directly. It drives an
//! [`AudioEngine`], which owns a [`Transport`] clock for timed work, and the
//! engine turns pitches into sound through a [`VoiceSink`] (the cpal synth or
//! a MIDI port).

use thiserror::Error;

pub mod engine;
pub mod offline;
pub mod synth;
pub mod timeline;
pub mod transport;

pub use engine::{MidiEngine, ScheduledEngine, SynthEngine};
pub use offline::{EngineCall, OfflineEngine};
pub use synth::SynthOutput;
pub use timeline::{ScheduleHandle, Timeline};
pub use transport::{ClockTransport, VirtualTransport};

/// Errors reported by audio engines. None of them are fatal to editing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has not been resumed by a user gesture yet, or has no device.
    #[error("audio engine is not ready")]
    NotReady,
    /// The pitch name could not be mapped to a note number.
    #[error("unknown pitch {0:?}")]
    UnknownPitch(String),
    /// Backend specific failure with additional context.
    #[error("audio device error: {0}")]
    Device(String),
}

/// Callback run by a transport when its scheduled time is reached.
pub type TransportCallback = Box<dyn FnOnce() + Send + 'static>;

/// Shared timeline clock used to sequence timed events.
///
/// Times are seconds on the transport timeline. Scheduled callbacks only fire
/// from [`Transport::poll`] while the transport is started, and a callback
/// that was cancelled or cleared never runs.
pub trait Transport {
    fn start(&mut self);
    fn stop(&mut self);
    /// Drops every pending scheduled callback.
    fn cancel(&mut self);
    fn set_position(&mut self, seconds: f64);
    fn now(&self) -> f64;
    fn is_started(&self) -> bool;
    fn schedule(&mut self, at_seconds: f64, callback: TransportCallback) -> ScheduleHandle;
    /// Revokes one scheduled callback. Returns false if it already fired or was cleared.
    fn clear(&mut self, handle: ScheduleHandle) -> bool;
    /// Runs every callback that is due, in time order. Returns how many ran.
    fn poll(&mut self) -> usize;
}

/// Polyphonic instrument with a transport.
pub trait AudioEngine {
    /// Whether the engine has been authorized and can make sound.
    fn is_ready(&self) -> bool;
    /// Authorization step, expected to be called from a user gesture.
    fn resume(&mut self) -> Result<(), EngineError>;
    fn attack(&mut self, pitch: &str) -> Result<(), EngineError>;
    fn release(&mut self, pitch: &str) -> Result<(), EngineError>;
    /// Plays `pitch` for `duration_seconds` starting at transport time `when_seconds`.
    fn attack_release(
        &mut self,
        pitch: &str,
        duration_seconds: f64,
        when_seconds: f64,
    ) -> Result<(), EngineError>;
    /// Silences every sounding voice and drops pending note events.
    fn release_all(&mut self) -> Result<(), EngineError>;
    /// Drops note events queued by `attack_release` without touching
    /// sounding voices.
    fn clear_scheduled(&mut self);
    fn transport(&mut self) -> &mut dyn Transport;
    /// Fires due note events and transport callbacks. Called once per frame.
    fn poll(&mut self);
}

/// Device side of an engine: turns note numbers into sound.
pub trait VoiceSink {
    fn is_ready(&self) -> bool;
    fn open(&mut self) -> Result<(), EngineError>;
    fn note_on(&mut self, note: u8);
    fn note_off(&mut self, note: u8);
    fn all_notes_off(&mut self);
}
