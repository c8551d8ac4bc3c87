/// Polyphonic sine synth using cpal
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use super::{EngineError, VoiceSink};
use crate::midi::midi_note_to_frequency;

const MAX_VOICES: usize = 16;
const VOICE_GAIN: f32 = 0.15;
const ATTACK_SECONDS: f32 = 0.005;
const RELEASE_SECONDS: f32 = 0.08;

#[derive(Debug, Clone)]
struct Voice {
    note: u8,
    frequency: f32,
    phase: f32,
    level: f32,
    gate: bool,
}

/// Voices shared between the UI thread and the audio callback.
#[derive(Debug)]
pub struct VoiceBank {
    voices: Vec<Voice>,
    sample_rate: f32,
}

impl VoiceBank {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            sample_rate: sample_rate.max(1.0),
        }
    }

    pub fn note_on(&mut self, note: u8) {
        if let Some(voice) = self.voices.iter_mut().find(|v| v.note == note) {
            voice.gate = true;
            return;
        }
        if self.voices.len() >= MAX_VOICES {
            // steal the oldest voice
            self.voices.remove(0);
        }
        self.voices.push(Voice {
            note,
            frequency: midi_note_to_frequency(note),
            phase: 0.0,
            level: 0.0,
            gate: true,
        });
    }

    pub fn note_off(&mut self, note: u8) {
        for voice in self.voices.iter_mut().filter(|v| v.note == note) {
            voice.gate = false;
        }
    }

    pub fn all_notes_off(&mut self) {
        self.voices.clear();
    }

    pub fn sounding(&self) -> usize {
        self.voices.len()
    }

    pub fn is_gated(&self, note: u8) -> bool {
        self.voices.iter().any(|v| v.note == note && v.gate)
    }

    /// Fills an interleaved buffer, writing the same signal to every channel.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let attack_step = 1.0 / (ATTACK_SECONDS * self.sample_rate);
        let release_step = 1.0 / (RELEASE_SECONDS * self.sample_rate);

        for frame in data.chunks_mut(channels) {
            let mut mix = 0.0;
            for voice in self.voices.iter_mut() {
                if voice.gate {
                    voice.level = (voice.level + attack_step).min(1.0);
                } else {
                    voice.level = (voice.level - release_step).max(0.0);
                }
                mix += (voice.phase * 2.0 * std::f32::consts::PI).sin() * voice.level;
                voice.phase += voice.frequency / self.sample_rate;
                if voice.phase >= 1.0 {
                    voice.phase -= 1.0;
                }
            }
            let sample = (mix * VOICE_GAIN).clamp(-1.0, 1.0);
            for out in frame.iter_mut() {
                *out = sample;
            }
            self.voices.retain(|v| v.gate || v.level > 0.0);
        }
    }
}

/// cpal output stream driving a [`VoiceBank`]. Silent until opened.
pub struct SynthOutput {
    _stream: Option<cpal::Stream>,
    voices: Arc<Mutex<VoiceBank>>,
}

impl SynthOutput {
    pub fn new() -> Self {
        Self {
            _stream: None,
            voices: Arc::new(Mutex::new(VoiceBank::new(44_100.0))),
        }
    }

    pub fn voices(&self) -> &Arc<Mutex<VoiceBank>> {
        &self.voices
    }

    fn setup_audio_stream(voices: Arc<Mutex<VoiceBank>>) -> Result<cpal::Stream, EngineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::Device("no default output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|err| EngineError::Device(err.to_string()))?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        *voices.lock() = VoiceBank::new(sample_rate);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    voices.lock().render(data, channels);
                },
                |err| warn!(%err, "audio stream error"),
                None,
            ),
            other => {
                return Err(EngineError::Device(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|err| EngineError::Device(err.to_string()))?;

        stream
            .play()
            .map_err(|err| EngineError::Device(err.to_string()))?;
        info!(sample_rate, channels, "audio output started");
        Ok(stream)
    }
}

impl Default for SynthOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceSink for SynthOutput {
    fn is_ready(&self) -> bool {
        self._stream.is_some()
    }

    fn open(&mut self) -> Result<(), EngineError> {
        if self._stream.is_none() {
            self._stream = Some(Self::setup_audio_stream(Arc::clone(&self.voices))?);
        }
        Ok(())
    }

    fn note_on(&mut self, note: u8) {
        self.voices.lock().note_on(note);
    }

    fn note_off(&mut self, note: u8) {
        self.voices.lock().note_off(note);
    }

    fn all_notes_off(&mut self) {
        self.voices.lock().all_notes_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_retriggers_instead_of_doubling() {
        let mut bank = VoiceBank::new(48_000.0);
        bank.note_on(60);
        bank.note_on(60);
        assert_eq!(bank.sounding(), 1);
        assert!(bank.is_gated(60));
    }

    #[test]
    fn voice_count_is_capped() {
        let mut bank = VoiceBank::new(48_000.0);
        for note in 40..(40 + MAX_VOICES as u8 + 4) {
            bank.note_on(note);
        }
        assert_eq!(bank.sounding(), MAX_VOICES);
        assert!(!bank.is_gated(40));
    }

    #[test]
    fn released_voice_fades_out_and_is_dropped() {
        let mut bank = VoiceBank::new(1_000.0);
        bank.note_on(69);
        let mut buffer = vec![0.0; 64];
        bank.render(&mut buffer, 2);
        assert!(buffer.iter().any(|s| *s != 0.0));
        assert_eq!(buffer[0], buffer[1]);

        bank.note_off(69);
        let mut tail = vec![0.0; 1_000];
        bank.render(&mut tail, 1);
        assert_eq!(bank.sounding(), 0);
    }

    #[test]
    fn all_notes_off_is_immediate() {
        let mut bank = VoiceBank::new(48_000.0);
        bank.note_on(60);
        bank.note_on(64);
        bank.all_notes_off();
        assert_eq!(bank.sounding(), 0);
        let mut buffer = vec![1.0; 8];
        bank.render(&mut buffer, 1);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn unopened_output_is_not_ready() {
        let output = SynthOutput::new();
        assert!(!output.is_ready());
    }
}
