//! Render-side stages of a playback session.
//!
//! The decoded (and possibly resampled) source is wrapped, innermost first,
//! in a [`PositionTracker`], a [`PauseGate`] and a [`Completion`] hook. Each
//! stage touches the controller's shared state only once per
//! `BUFFER_FRAMES` frames, so the render thread holds the lock briefly and
//! always on a frame boundary.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::Sender;
use rodio::Source;
use tracing::{debug, info};

use super::decoder::{FailureSlot, StreamDecoder};
use super::resample::Resampled;
use super::types::{NowPlaying, PlaybackPhase, SessionEnd, SessionId};

/// Frames rendered between two synchronizations with the controller.
///
/// Also the latency of pause and resume: about 6 ms at 44.1 kHz.
pub const BUFFER_FRAMES: usize = 256;

/// State shared between the controller and the render thread.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    /// Session currently allowed to render, if any.
    pub active: Option<SessionId>,
    pub paused: bool,
    /// Output frames consumed by the active session.
    pub frames: u64,
    pub now_playing: Option<NowPlaying>,
    pub phase: PlaybackPhase,
}

impl Shared {
    pub fn is_active(&self, session: SessionId) -> bool {
        self.active == Some(session)
    }

    /// Forget the active session and return to `Idle`.
    pub fn clear(&mut self) -> Option<SessionId> {
        self.paused = false;
        self.frames = 0;
        self.now_playing = None;
        self.phase = PlaybackPhase::Idle;
        self.active.take()
    }
}

pub(crate) type SharedState = Arc<Mutex<Shared>>;

/// Lock the shared state, recovering from a poisoned lock.
pub(crate) fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The full chain handed to the output for one session.
pub type SessionPipeline = Completion<PauseGate<PositionTracker<Resampled<StreamDecoder>>>>;

/// Counts frames pulled through it and publishes the count.
pub struct PositionTracker<S> {
    inner: S,
    shared: SharedState,
    session: SessionId,
    interval: usize,
    unflushed: usize,
}

impl<S: Source> PositionTracker<S> {
    pub(crate) fn new(inner: S, shared: SharedState, session: SessionId) -> Self {
        let interval = BUFFER_FRAMES * usize::from(inner.channels().max(1));
        Self {
            inner,
            shared,
            session,
            interval,
            unflushed: 0,
        }
    }

    fn flush(&mut self) {
        let channels = usize::from(self.inner.channels().max(1));
        let frames = self.unflushed / channels;
        if frames == 0 {
            return;
        }
        self.unflushed -= frames * channels;

        let mut shared = lock(&self.shared);
        if shared.is_active(self.session) {
            shared.frames += frames as u64;
        }
    }
}

impl<S: Source> Iterator for PositionTracker<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self.inner.next() {
            Some(sample) => {
                self.unflushed += 1;
                if self.unflushed >= self.interval {
                    self.flush();
                }
                Some(sample)
            }
            None => {
                self.flush();
                None
            }
        }
    }
}

impl<S: Source> Source for PositionTracker<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

/// Emits silence instead of pulling from its source while paused.
///
/// Ends the stream as soon as its session is no longer the active one.
pub struct PauseGate<S> {
    inner: S,
    shared: SharedState,
    session: SessionId,
    interval: usize,
    countdown: usize,
    paused: bool,
}

impl<S: Source> PauseGate<S> {
    pub(crate) fn new(inner: S, shared: SharedState, session: SessionId) -> Self {
        let interval = BUFFER_FRAMES * usize::from(inner.channels().max(1));
        Self {
            inner,
            shared,
            session,
            interval,
            countdown: 0,
            paused: false,
        }
    }
}

impl<S: Source> Iterator for PauseGate<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.countdown == 0 {
            let shared = lock(&self.shared);
            if !shared.is_active(self.session) {
                return None;
            }
            self.paused = shared.paused;
            self.countdown = self.interval;
        }
        self.countdown -= 1;

        if self.paused {
            Some(0.0)
        } else {
            self.inner.next()
        }
    }
}

impl<S: Source> Source for PauseGate<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Fires the completion signal once, when its source runs dry.
///
/// A session that was stopped or replaced ends silently.
pub struct Completion<S> {
    inner: S,
    shared: SharedState,
    session: SessionId,
    done: Sender<SessionEnd>,
    failure: FailureSlot,
    fired: bool,
}

impl<S: Source> Completion<S> {
    pub(crate) fn new(
        inner: S,
        shared: SharedState,
        session: SessionId,
        done: Sender<SessionEnd>,
        failure: FailureSlot,
    ) -> Self {
        Self {
            inner,
            shared,
            session,
            done,
            failure,
            fired: false,
        }
    }

    fn finish(&mut self) {
        self.fired = true;

        let ended = {
            let mut shared = lock(&self.shared);
            shared.is_active(self.session) && shared.clear().is_some()
        };
        if !ended {
            debug!(session = self.session, "stale session drained");
            return;
        }

        let end = match self.failure.get() {
            Some(error) => SessionEnd::Failed {
                session: self.session,
                error: error.clone(),
            },
            None => SessionEnd::Finished {
                session: self.session,
            },
        };
        info!(session = self.session, failed = end.error().is_some(), "session ended");
        // Capacity one and drained on every play; a full slot means nobody
        // is listening and the signal can be dropped.
        let _ = self.done.try_send(end);
    }
}

impl<S: Source> Iterator for Completion<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.fired {
            return None;
        }
        let sample = self.inner.next();
        if sample.is_none() {
            self.finish();
        }
        sample
    }
}

impl<S: Source> Source for Completion<S> {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
