//! Playback error types.

use thiserror::Error;

/// Opening a stream failed before any audio was decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream open timed out")]
    Timeout,
    #[error("stream request failed: {0}")]
    Request(String),
    #[error("stream returned HTTP {0}")]
    Status(u16),
}

/// The container or codec could not be read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unrecognized stream: {0}")]
    Probe(String),
    #[error("stream has no audio track")]
    NoAudioTrack,
    #[error("unsupported codec: {0}")]
    Codec(String),
    /// Raised after playback started; ends the session like a normal
    /// completion but is reported as a failure.
    #[error("stream failed mid-playback: {0}")]
    Stream(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("connect: {0}")]
    Connect(#[from] StreamError),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("nothing is playing")]
    NoActiveSession,
    #[error("audio output: {0}")]
    Output(String),
}

impl PlayerError {
    /// Errors that only mean "nothing to act on" and are never shown.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoActiveSession)
    }
}
