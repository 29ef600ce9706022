//! The Subsonic server the player streams from.
//!
//! Provides the stream source, the two queue builders (album tracks and
//! random songs) and the now-playing/scrobble notifications.

mod client;
mod error;
mod types;

pub use client::SubsonicClient;
#[cfg(test)]
pub use error::ApiError;

#[cfg(test)]
mod tests;
