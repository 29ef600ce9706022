//! Streaming playback.
//!
//! [`Controller`] owns at most one session. A session is a network
//! [`StreamBody`] decoded by symphonia, resampled to the output rate when
//! needed, then passed through a position tracker, a pause gate and a
//! completion hook before the [`AudioOutput`] renders it on its own thread.

mod body;
mod controller;
mod decoder;
mod error;
mod output;
mod pipeline;
mod resample;
mod types;

pub use body::StreamBody;
pub use controller::Controller;
pub use decoder::is_known_format;
pub use error::{PlayerError, StreamError};
pub use output::{AudioOutput, RodioOutput};
pub use types::{PlaybackPhase, SessionEnd, SessionId};

#[cfg(test)]
pub use body::BodyHandle;
#[cfg(test)]
pub use controller::OpenStream;
#[cfg(test)]
pub use decoder::decoder_format;
#[cfg(test)]
pub use error::DecodeError;
#[cfg(test)]
pub use output::ManualOutput;
#[cfg(test)]
pub use types::NowPlaying;

#[cfg(test)]
mod tests;
