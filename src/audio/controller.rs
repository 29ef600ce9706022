//! The playback controller: one session at a time, stop-then-start.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, bounded};
use rodio::Source;
use tracing::{info, warn};

use crate::track::TrackDescriptor;

use super::body::{BodyHandle, StreamBody};
use super::decoder::StreamDecoder;
use super::error::{PlayerError, StreamError};
use super::output::AudioOutput;
use super::pipeline::{Completion, PauseGate, PositionTracker, SharedState, lock};
use super::resample::Resampled;
use super::types::{NowPlaying, PlaybackPhase, SessionEnd, SessionId};

/// Something that can open a fresh byte stream for one session.
pub trait OpenStream {
    fn open(&self) -> Result<StreamBody, StreamError>;
}

impl<F> OpenStream for F
where
    F: Fn() -> Result<StreamBody, StreamError>,
{
    fn open(&self) -> Result<StreamBody, StreamError> {
        self()
    }
}

pub struct Controller<O: AudioOutput> {
    output: O,
    shared: SharedState,
    /// Closes the network body of the active session.
    body: Option<BodyHandle>,
    last_session: SessionId,
    done_tx: Sender<SessionEnd>,
    done_rx: Receiver<SessionEnd>,
    fallback_format: String,
}

impl<O: AudioOutput> Controller<O> {
    /// `fallback_format` is the decoder used for format labels without one
    /// of their own.
    pub fn new(output: O, fallback_format: impl Into<String>) -> Self {
        let (done_tx, done_rx) = bounded(1);
        Self {
            output,
            shared: SharedState::default(),
            body: None,
            last_session: 0,
            done_tx,
            done_rx,
            fallback_format: fallback_format.into(),
        }
    }

    /// Stop whatever is playing, then open `source` and start rendering it.
    ///
    /// Returns the new session's id once the output has it; open and probe
    /// failures leave the controller idle. The session may already have
    /// ended by the time this returns.
    pub fn play<S>(
        &mut self,
        source: &S,
        format_hint: &str,
        track: TrackDescriptor,
    ) -> Result<SessionId, PlayerError>
    where
        S: OpenStream + ?Sized,
    {
        self.stop();
        // Nothing from an earlier session may reach the next listener.
        while self.done_rx.try_recv().is_ok() {}

        lock(&self.shared).phase = PlaybackPhase::Loading;

        let body = match source.open() {
            Ok(body) => body,
            Err(e) => {
                warn!(track = %track.id, error = %e, "stream open failed");
                self.stop();
                return Err(e.into());
            }
        };
        let (reader, handle) = body.into_parts();

        let decoder = match StreamDecoder::open(reader, format_hint, &self.fallback_format) {
            Ok(decoder) => decoder,
            Err(e) => {
                warn!(track = %track.id, error = %e, "stream could not be decoded");
                handle.close();
                self.stop();
                return Err(e);
            }
        };

        let source_rate = decoder.sample_rate();
        let failure = decoder.failure();
        let resampled = Resampled::new(decoder, self.output.sample_rate());

        self.last_session += 1;
        let session = self.last_session;

        let tracker = PositionTracker::new(resampled, Arc::clone(&self.shared), session);
        let gate = PauseGate::new(tracker, Arc::clone(&self.shared), session);
        let pipeline = Completion::new(
            gate,
            Arc::clone(&self.shared),
            session,
            self.done_tx.clone(),
            failure,
        );

        info!(
            session,
            title = %track.title,
            artist = %track.artist,
            format = %format_hint,
            source_rate,
            output_rate = self.output.sample_rate(),
            "starting playback"
        );

        {
            let mut shared = lock(&self.shared);
            shared.active = Some(session);
            shared.paused = false;
            shared.frames = 0;
            shared.now_playing = Some(NowPlaying { session, track });
            shared.phase = PlaybackPhase::Playing;
        }
        self.body = Some(handle);

        if let Err(e) = self.output.start(pipeline) {
            self.stop();
            return Err(e);
        }
        Ok(session)
    }

    /// Tear down the active session, if any. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let stopped = lock(&self.shared).clear();
        if let Some(body) = self.body.take() {
            body.close();
        }
        self.output.clear();
        if let Some(session) = stopped {
            info!(session, "playback stopped");
        }
    }

    /// Flip the pause gate; returns whether playback is now paused.
    ///
    /// The render thread sees the flag at its next `BUFFER_FRAMES` boundary,
    /// so up to that many frames may still play (and be counted by
    /// `elapsed`) after this returns.
    pub fn toggle_pause(&mut self) -> Result<bool, PlayerError> {
        let mut shared = lock(&self.shared);
        if shared.active.is_none() {
            return Err(PlayerError::NoActiveSession);
        }
        shared.paused = !shared.paused;
        shared.phase = if shared.paused {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Playing
        };
        Ok(shared.paused)
    }

    /// Seconds of audio rendered by the active session, 0 when idle.
    pub fn elapsed(&self) -> f64 {
        let shared = lock(&self.shared);
        if shared.active.is_none() {
            return 0.0;
        }
        shared.frames as f64 / f64::from(self.output.sample_rate().max(1))
    }

    pub fn current(&self) -> Option<NowPlaying> {
        lock(&self.shared).now_playing.clone()
    }

    pub fn phase(&self) -> PlaybackPhase {
        lock(&self.shared).phase
    }

    /// Completion signal; fires once per session that plays to its end.
    pub fn done(&self) -> Receiver<SessionEnd> {
        self.done_rx.clone()
    }
}

impl<O: AudioOutput> Drop for Controller<O> {
    fn drop(&mut self) {
        self.stop();
    }
}
