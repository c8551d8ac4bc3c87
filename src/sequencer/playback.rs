//! Playback scheduler - replays the note store against an audio engine
//!
//! A session schedules every note up front, then lets the transport run. The
//! completion callback carries the generation of the session that scheduled
//! it, so a callback left over from a cancelled session can never stop a
//! newer one.
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::geometry::{cell_to_time_seconds, DEFAULT_SECONDS_PER_CELL};
use super::NoteStore;
use crate::audio::{AudioEngine, EngineError, ScheduleHandle};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio engine has not been started; resume it from a user gesture first")]
    EngineUnavailable,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayOutcome {
    Started { notes: usize, total_seconds: f64 },
    AlreadyPlaying,
    NothingToPlay,
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    generation: u64,
    completion: Option<ScheduleHandle>,
}

pub struct PlaybackScheduler {
    session: Arc<Mutex<Session>>,
    seconds_per_cell: f64,
}

impl PlaybackScheduler {
    pub fn new(seconds_per_cell: f64) -> Self {
        let seconds_per_cell = if seconds_per_cell.is_finite() && seconds_per_cell > 0.0 {
            seconds_per_cell
        } else {
            DEFAULT_SECONDS_PER_CELL
        };
        Self {
            session: Arc::new(Mutex::new(Session {
                state: SessionState::Stopped,
                generation: 0,
                completion: None,
            })),
            seconds_per_cell,
        }
    }

    pub fn seconds_per_cell(&self) -> f64 {
        self.seconds_per_cell
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SessionState::Playing
    }

    pub fn play(
        &mut self,
        store: &NoteStore,
        engine: &mut dyn AudioEngine,
    ) -> Result<PlayOutcome, PlaybackError> {
        if self.is_playing() {
            return Ok(PlayOutcome::AlreadyPlaying);
        }
        let Some(last_column) = store.max_occupied_column() else {
            debug!("nothing to play");
            return Ok(PlayOutcome::NothingToPlay);
        };
        if !engine.is_ready() {
            return Err(PlaybackError::EngineUnavailable);
        }

        // leftovers of a finished session must not leak into this one
        engine.clear_scheduled();
        let transport = engine.transport();
        transport.cancel();
        transport.stop();
        transport.set_position(0.0);
        let session_start = transport.now();

        for note in store.notes() {
            let duration = cell_to_time_seconds(note.duration_columns(), self.seconds_per_cell);
            let when =
                session_start + cell_to_time_seconds(note.start_column(), self.seconds_per_cell);
            if let Err(err) = engine.attack_release(note.pitch(), duration, when) {
                engine.transport().cancel();
                if let Err(cleanup) = engine.release_all() {
                    warn!(%cleanup, "could not clear partially scheduled session");
                }
                return Err(err.into());
            }
        }

        let total_seconds = cell_to_time_seconds(last_column, self.seconds_per_cell);
        let generation = {
            let mut session = self.session.lock();
            session.generation = session.generation.wrapping_add(1);
            session.generation
        };
        let session = Arc::clone(&self.session);
        let handle = engine.transport().schedule(
            session_start + total_seconds,
            Box::new(move || {
                let mut session = session.lock();
                if session.generation == generation {
                    session.state = SessionState::Stopped;
                    session.completion = None;
                    debug!(generation, "playback finished");
                }
            }),
        );

        {
            let mut session = self.session.lock();
            session.state = SessionState::Playing;
            session.completion = Some(handle);
        }
        engine.transport().start();

        info!(notes = store.len(), total_seconds, "playback started");
        Ok(PlayOutcome::Started {
            notes: store.len(),
            total_seconds,
        })
    }

    /// Panic stop. Returns false when nothing was playing.
    pub fn stop(&mut self, engine: &mut dyn AudioEngine) -> bool {
        let completion = {
            let mut session = self.session.lock();
            if session.state == SessionState::Stopped {
                return false;
            }
            session.state = SessionState::Stopped;
            session.generation = session.generation.wrapping_add(1);
            session.completion.take()
        };

        let transport = engine.transport();
        if let Some(handle) = completion {
            transport.clear(handle);
        }
        transport.cancel();
        transport.stop();
        if let Err(err) = engine.release_all() {
            debug!(%err, "release all dropped");
        }
        info!("playback stopped");
        true
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SECONDS_PER_CELL)
    }
}
