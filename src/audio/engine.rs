/// Audio engine over a voice sink, with note events sequenced on a wall clock
use tracing::debug;

use super::timeline::Timeline;
use super::transport::ClockTransport;
use super::{AudioEngine, EngineError, Transport, VoiceSink};
use crate::audio::synth::SynthOutput;
use crate::midi::{parse_note_name, MidiOutputDevice};

const MIN_NOTE_SECONDS: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteEvent {
    On(u8),
    Off(u8),
}

pub struct ScheduledEngine<S: VoiceSink> {
    sink: S,
    transport: ClockTransport,
    events: Timeline<NoteEvent>,
}

pub type SynthEngine = ScheduledEngine<SynthOutput>;
pub type MidiEngine = ScheduledEngine<MidiOutputDevice>;

impl<S: VoiceSink> ScheduledEngine<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            transport: ClockTransport::new(),
            events: Timeline::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Note events waiting for their transport time.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn note_for(&self, pitch: &str) -> Result<u8, EngineError> {
        if !self.sink.is_ready() {
            return Err(EngineError::NotReady);
        }
        parse_note_name(pitch).ok_or_else(|| EngineError::UnknownPitch(pitch.to_string()))
    }

    fn fire_due_events(&mut self) {
        if !self.transport.is_started() {
            return;
        }
        let mut due = self.events.take_due(self.transport.now());
        // a note ending where the next one starts must not cut it off
        due.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| matches!(a.1, NoteEvent::On(_)).cmp(&matches!(b.1, NoteEvent::On(_))))
        });
        for (_, event) in due {
            match event {
                NoteEvent::On(note) => self.sink.note_on(note),
                NoteEvent::Off(note) => self.sink.note_off(note),
            }
        }
    }
}

impl<S: VoiceSink + Default> Default for ScheduledEngine<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: VoiceSink> AudioEngine for ScheduledEngine<S> {
    fn is_ready(&self) -> bool {
        self.sink.is_ready()
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.sink.open()
    }

    fn attack(&mut self, pitch: &str) -> Result<(), EngineError> {
        let note = self.note_for(pitch)?;
        self.sink.note_on(note);
        Ok(())
    }

    fn release(&mut self, pitch: &str) -> Result<(), EngineError> {
        let note = self.note_for(pitch)?;
        self.sink.note_off(note);
        Ok(())
    }

    fn attack_release(
        &mut self,
        pitch: &str,
        duration_seconds: f64,
        when_seconds: f64,
    ) -> Result<(), EngineError> {
        let note = self.note_for(pitch)?;
        let duration = duration_seconds.max(MIN_NOTE_SECONDS);
        self.events.insert(when_seconds, NoteEvent::On(note));
        self.events.insert(when_seconds + duration, NoteEvent::Off(note));
        debug!(pitch, when_seconds, duration, "note scheduled");
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), EngineError> {
        self.events.clear();
        if !self.sink.is_ready() {
            return Err(EngineError::NotReady);
        }
        self.sink.all_notes_off();
        Ok(())
    }

    fn clear_scheduled(&mut self) {
        self.events.clear();
    }

    fn transport(&mut self) -> &mut dyn Transport {
        &mut self.transport
    }

    fn poll(&mut self) {
        self.fire_due_events();
        self.transport.poll();
    }
}
