//! Small shared types for the playback controller.

use crate::track::TrackDescriptor;

use super::error::DecodeError;

/// Identifies one playback session; a fresh id is issued by every `play`.
pub type SessionId = u64;

/// Snapshot of the track being played by the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub session: SessionId,
    pub track: TrackDescriptor,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    /// Stream is being opened and probed.
    Loading,
    Playing,
    Paused,
}

/// How a session ended, delivered once through the completion signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The stream was exhausted.
    Finished { session: SessionId },
    /// Decoding stopped early on an error.
    Failed {
        session: SessionId,
        error: DecodeError,
    },
}

impl SessionEnd {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Finished { session } | Self::Failed { session, .. } => *session,
        }
    }

    pub fn error(&self) -> Option<&DecodeError> {
        match self {
            Self::Finished { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}
