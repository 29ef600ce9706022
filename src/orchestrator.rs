//! Queue-driven continuous play.
//!
//! The [`Orchestrator`] owns the queue and the controller. When a session
//! ends it asks the queue for the next track and starts it, firing the
//! now-playing and scrobble notifications on the way.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select};
use tracing::{debug, info};

use crate::audio::{
    AudioOutput, Controller, PlayerError, SessionEnd, SessionId, StreamBody, StreamError,
};
use crate::queue::{Queue, Removed};
use crate::track::TrackDescriptor;

/// Opens the byte stream of a track, optionally asking for a transcode.
pub trait StreamProvider: Send + Sync {
    fn open_stream(&self, track_id: &str, transcode: Option<&str>) -> Result<StreamBody, StreamError>;
}

/// Listening notifications. Calls return immediately; failures are the
/// implementation's to log.
pub trait Announce: Send + Sync {
    fn now_playing(&self, track_id: &str);
    fn scrobble(&self, track_id: &str);
}

/// Formats the server is asked to transcode, and into what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodePolicy {
    pub formats: Vec<String>,
    pub target: String,
}

impl Default for TranscodePolicy {
    fn default() -> Self {
        Self {
            formats: vec!["m4a".into(), "aac".into(), "wma".into()],
            target: "mp3".into(),
        }
    }
}

impl TranscodePolicy {
    /// Transcode target to request for a track of `format`, if any.
    pub fn request_for(&self, format: &str) -> Option<&str> {
        self.formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format.trim()))
            .then_some(self.target.as_str())
    }
}

/// What [`Orchestrator::handle_track_end`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The end belonged to a session that was already replaced or stopped.
    Stale,
    /// The next queued track is playing.
    Playing,
    /// Nothing left in the queue; the player is idle.
    Idle,
}

pub struct Orchestrator<O: AudioOutput> {
    controller: Controller<O>,
    queue: Queue,
    provider: Arc<dyn StreamProvider>,
    announcer: Arc<dyn Announce>,
    transcode: TranscodePolicy,
    /// Session started by us and the id of its track.
    playing: Option<(SessionId, String)>,
}

impl<O: AudioOutput> Orchestrator<O> {
    pub fn new(
        controller: Controller<O>,
        provider: Arc<dyn StreamProvider>,
        announcer: Arc<dyn Announce>,
        transcode: TranscodePolicy,
    ) -> Self {
        Self {
            controller,
            queue: Queue::new(),
            provider,
            announcer,
            transcode,
            playing: None,
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn controller(&self) -> &Controller<O> {
        &self.controller
    }

    /// Replace the queue and start playing at `start`.
    pub fn play_queue(&mut self, tracks: Vec<TrackDescriptor>, start: usize) -> Result<(), PlayerError> {
        self.queue.replace(tracks, start);
        match self.queue.current().cloned() {
            Some(track) => self.start(track),
            None => {
                self.stop();
                Ok(())
            }
        }
    }

    /// Play the entry under the cursor.
    pub fn jump_to(&mut self) -> Result<(), PlayerError> {
        match self.queue.jump_to().cloned() {
            Some(track) => self.start(track),
            None => Ok(()),
        }
    }

    /// User "next": abandon the current track for the following one.
    pub fn skip(&mut self) -> Result<Advance, PlayerError> {
        self.advance()
    }

    /// React to the controller's completion signal.
    ///
    /// A clean finish is scrobbled; a failed one is not, but the queue still
    /// moves on. The caller reports `end.error()` itself.
    pub fn handle_track_end(&mut self, end: &SessionEnd) -> Result<Advance, PlayerError> {
        let Some((session, track_id)) = self.playing.take_if(|(s, _)| *s == end.session()) else {
            debug!(session = end.session(), "ignoring end of a replaced session");
            return Ok(Advance::Stale);
        };

        match end {
            SessionEnd::Finished { .. } => self.announcer.scrobble(&track_id),
            SessionEnd::Failed { error, .. } => {
                info!(session, track = %track_id, %error, "track abandoned");
            }
        }
        self.advance()
    }

    /// Remove the entry under the cursor; removing the playing one stops it.
    pub fn remove_selected(&mut self) -> Option<Removed> {
        let removed = self.queue.remove()?;
        if removed.was_current {
            self.stop();
        }
        Some(removed)
    }

    pub fn move_up(&mut self) {
        self.queue.move_up();
    }

    pub fn move_down(&mut self) {
        self.queue.move_down();
    }

    pub fn cursor_up(&mut self) {
        self.queue.cursor_up();
    }

    pub fn cursor_down(&mut self) {
        self.queue.cursor_down();
    }

    pub fn cursor_top(&mut self) {
        self.queue.cursor_top();
    }

    pub fn cursor_bottom(&mut self) {
        self.queue.cursor_bottom();
    }

    /// Returns whether playback is now paused, or `None` when idle.
    pub fn toggle_pause(&mut self) -> Option<bool> {
        self.controller.toggle_pause().ok()
    }

    pub fn stop(&mut self) {
        self.playing = None;
        self.controller.stop();
    }

    fn advance(&mut self) -> Result<Advance, PlayerError> {
        match self.queue.next().cloned() {
            Some(track) => {
                self.start(track)?;
                Ok(Advance::Playing)
            }
            None => {
                info!("end of queue");
                self.stop();
                Ok(Advance::Idle)
            }
        }
    }

    fn start(&mut self, track: TrackDescriptor) -> Result<(), PlayerError> {
        self.playing = None;

        let id = track.id.clone();
        let format = track.format.clone();
        let transcode = self.transcode.request_for(&format).map(str::to_owned);
        let provider = &self.provider;
        let source = || provider.open_stream(&id, transcode.as_deref());

        let session = self.controller.play(&source, &format, track)?;

        self.playing = Some((session, id.clone()));
        self.announcer.now_playing(&id);
        Ok(())
    }
}

/// Forward completion signals to `events` on a dedicated thread.
///
/// The thread exits when `shutdown` is dropped or sent to, or when either
/// channel disconnects.
pub fn spawn_end_watcher(
    done: Receiver<SessionEnd>,
    shutdown: Receiver<()>,
    events: Sender<SessionEnd>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("subtune-end-watcher".into())
        .spawn(move || {
            loop {
                select! {
                    recv(done) -> end => match end {
                        Ok(end) => {
                            if events.send(end).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    recv(shutdown) -> _ => break,
                }
            }
            debug!("end watcher exiting");
        })
}
