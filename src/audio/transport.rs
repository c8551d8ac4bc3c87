/// Transport clocks: wall-clock for devices, virtual for headless sessions
use std::time::Instant;

use tracing::trace;

use super::timeline::{ScheduleHandle, Timeline};
use super::{Transport, TransportCallback};

fn run_due(timeline: &mut Timeline<TransportCallback>, now: f64) -> usize {
    let due = timeline.take_due(now);
    let count = due.len();
    for (at, callback) in due {
        trace!(at, now, "transport callback fired");
        callback();
    }
    count
}

/// Transport whose position advances with real time while started.
pub struct ClockTransport {
    position: f64,
    started_at: Option<Instant>,
    callbacks: Timeline<TransportCallback>,
}

impl ClockTransport {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            started_at: None,
            callbacks: Timeline::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }
}

impl Default for ClockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ClockTransport {
    fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.position = self.now();
        self.started_at = None;
    }

    fn cancel(&mut self) {
        self.callbacks.clear();
    }

    fn set_position(&mut self, seconds: f64) {
        self.position = seconds.max(0.0);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn now(&self) -> f64 {
        match self.started_at {
            Some(started) => self.position + started.elapsed().as_secs_f64(),
            None => self.position,
        }
    }

    fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    fn schedule(&mut self, at_seconds: f64, callback: TransportCallback) -> ScheduleHandle {
        self.callbacks.insert(at_seconds, callback)
    }

    fn clear(&mut self, handle: ScheduleHandle) -> bool {
        self.callbacks.remove(handle).is_some()
    }

    fn poll(&mut self) -> usize {
        if !self.is_started() {
            return 0;
        }
        let now = self.now();
        run_due(&mut self.callbacks, now)
    }
}

/// Transport that only moves when told to, for tests and offline rendering.
pub struct VirtualTransport {
    position: f64,
    started: bool,
    callbacks: Timeline<TransportCallback>,
}

impl VirtualTransport {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            started: false,
            callbacks: Timeline::new(),
        }
    }

    /// Moves the clock forward by `seconds` if started, then fires due callbacks.
    pub fn advance(&mut self, seconds: f64) -> usize {
        if self.started && seconds > 0.0 {
            self.position += seconds;
        }
        self.poll()
    }

    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }
}

impl Default for VirtualTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for VirtualTransport {
    fn start(&mut self) {
        self.started = true;
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn cancel(&mut self) {
        self.callbacks.clear();
    }

    fn set_position(&mut self, seconds: f64) {
        self.position = seconds.max(0.0);
    }

    fn now(&self) -> f64 {
        self.position
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn schedule(&mut self, at_seconds: f64, callback: TransportCallback) -> ScheduleHandle {
        self.callbacks.insert(at_seconds, callback)
    }

    fn clear(&mut self, handle: ScheduleHandle) -> bool {
        self.callbacks.remove(handle).is_some()
    }

    fn poll(&mut self) -> usize {
        if !self.started {
            return 0;
        }
        run_due(&mut self.callbacks, self.position)
    }
}
