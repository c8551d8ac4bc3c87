//! Headless engine on a virtual clock.
//!
//! Makes no sound. Every successful engine and transport call is appended to a
//! log, and time only moves through [`OfflineEngine::advance`], which makes
//! whole editing sessions reproducible without an audio device.

use std::collections::BTreeSet;

use super::timeline::ScheduleHandle;
use super::transport::VirtualTransport;
use super::{AudioEngine, EngineError, Transport, TransportCallback};
use crate::midi::parse_note_name;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Resume,
    Attack(String),
    Release(String),
    AttackRelease {
        pitch: String,
        duration: f64,
        when: f64,
    },
    ReleaseAll,
    TransportStart,
    TransportStop,
    TransportCancel,
    TransportSetPosition(f64),
    TransportSchedule(f64),
    TransportClear,
}

impl EngineCall {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            EngineCall::TransportStart
                | EngineCall::TransportStop
                | EngineCall::TransportCancel
                | EngineCall::TransportSetPosition(_)
                | EngineCall::TransportSchedule(_)
                | EngineCall::TransportClear
        )
    }
}

/// [`VirtualTransport`] that records what was asked of it.
pub struct OfflineTransport {
    clock: VirtualTransport,
    log: Vec<EngineCall>,
}

impl Transport for OfflineTransport {
    fn start(&mut self) {
        self.log.push(EngineCall::TransportStart);
        self.clock.start();
    }

    fn stop(&mut self) {
        self.log.push(EngineCall::TransportStop);
        self.clock.stop();
    }

    fn cancel(&mut self) {
        self.log.push(EngineCall::TransportCancel);
        self.clock.cancel();
    }

    fn set_position(&mut self, seconds: f64) {
        self.log.push(EngineCall::TransportSetPosition(seconds));
        self.clock.set_position(seconds);
    }

    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn is_started(&self) -> bool {
        self.clock.is_started()
    }

    fn schedule(&mut self, at_seconds: f64, callback: TransportCallback) -> ScheduleHandle {
        self.log.push(EngineCall::TransportSchedule(at_seconds));
        self.clock.schedule(at_seconds, callback)
    }

    fn clear(&mut self, handle: ScheduleHandle) -> bool {
        self.log.push(EngineCall::TransportClear);
        self.clock.clear(handle)
    }

    fn poll(&mut self) -> usize {
        self.clock.poll()
    }
}

pub struct OfflineEngine {
    ready: bool,
    transport: OfflineTransport,
    sounding: BTreeSet<String>,
}

impl OfflineEngine {
    /// An engine that is already authorized.
    pub fn new() -> Self {
        Self {
            ready: true,
            transport: OfflineTransport {
                clock: VirtualTransport::new(),
                log: Vec::new(),
            },
            sounding: BTreeSet::new(),
        }
    }

    /// An engine that refuses every call until [`AudioEngine::resume`].
    pub fn locked() -> Self {
        Self {
            ready: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.transport.log
    }

    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.transport.log)
    }

    /// Pitches held by `attack` without a matching `release`.
    pub fn sounding(&self) -> &BTreeSet<String> {
        &self.sounding
    }

    pub fn pending_callbacks(&self) -> usize {
        self.transport.clock.pending()
    }

    /// Advances the virtual clock and fires whatever became due.
    pub fn advance(&mut self, seconds: f64) -> usize {
        self.transport.clock.advance(seconds)
    }

    fn check(&self, pitch: &str) -> Result<(), EngineError> {
        if !self.ready {
            return Err(EngineError::NotReady);
        }
        match parse_note_name(pitch) {
            Some(_) => Ok(()),
            None => Err(EngineError::UnknownPitch(pitch.to_string())),
        }
    }
}

impl Default for OfflineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for OfflineEngine {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.ready = true;
        self.transport.log.push(EngineCall::Resume);
        Ok(())
    }

    fn attack(&mut self, pitch: &str) -> Result<(), EngineError> {
        self.check(pitch)?;
        self.sounding.insert(pitch.to_string());
        self.transport.log.push(EngineCall::Attack(pitch.to_string()));
        Ok(())
    }

    fn release(&mut self, pitch: &str) -> Result<(), EngineError> {
        self.check(pitch)?;
        self.sounding.remove(pitch);
        self.transport.log.push(EngineCall::Release(pitch.to_string()));
        Ok(())
    }

    fn attack_release(
        &mut self,
        pitch: &str,
        duration_seconds: f64,
        when_seconds: f64,
    ) -> Result<(), EngineError> {
        self.check(pitch)?;
        self.transport.log.push(EngineCall::AttackRelease {
            pitch: pitch.to_string(),
            duration: duration_seconds,
            when: when_seconds,
        });
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), EngineError> {
        if !self.ready {
            return Err(EngineError::NotReady);
        }
        self.sounding.clear();
        self.transport.log.push(EngineCall::ReleaseAll);
        Ok(())
    }

    // attack_release is only logged here, so nothing is queued
    fn clear_scheduled(&mut self) {}

    fn transport(&mut self) -> &mut dyn Transport {
        &mut self.transport
    }

    fn poll(&mut self) {
        self.transport.poll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_engine_logs_nothing_until_resumed() {
        let mut engine = OfflineEngine::locked();
        assert!(engine.attack("C4").is_err());
        assert!(engine.release_all().is_err());
        assert!(engine.calls().is_empty());

        engine.resume().unwrap();
        engine.attack("C4").unwrap();
        assert_eq!(
            engine.calls(),
            &[EngineCall::Resume, EngineCall::Attack("C4".into())]
        );
        assert!(engine.sounding().contains("C4"));
    }

    #[test]
    fn transport_calls_are_recorded() {
        let mut engine = OfflineEngine::new();
        engine.transport().set_position(0.0);
        engine.transport().start();
        engine.transport().schedule(1.0, Box::new(|| {}));
        assert_eq!(engine.pending_callbacks(), 1);
        assert_eq!(engine.advance(1.0), 1);

        let calls = engine.take_calls();
        assert!(calls.iter().all(EngineCall::is_transport));
        assert_eq!(calls.len(), 3);
        assert!(engine.calls().is_empty());
    }
}
