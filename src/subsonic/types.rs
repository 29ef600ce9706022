//! Subsonic JSON response shapes (`f=json`).

use serde::Deserialize;

use crate::track::TrackDescriptor;

/// `{"subsonic-response": {...}}`
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    #[serde(rename = "subsonic-response")]
    pub response: Body<T>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Body<T> {
    pub status: String,
    pub error: Option<ErrorBody>,
    #[serde(flatten)]
    pub payload: T,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Responses that carry nothing beyond the status (`ping`, `scrobble`).
#[derive(Debug, Default, Deserialize)]
pub(super) struct Empty {}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AlbumPayload {
    pub album: Option<Album>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RandomSongsPayload {
    #[serde(rename = "randomSongs", default)]
    pub random_songs: SongList,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct SongList {
    #[serde(default)]
    pub song: Vec<Song>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub year: u32,
    pub song: Vec<Song>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub album: String,
    pub artist: String,
    pub album_id: String,
    pub year: u32,
    /// Seconds.
    pub duration: u64,
    /// File extension of the original (`mp3`, `flac`, `m4a` ...).
    pub suffix: String,
}

impl From<Song> for TrackDescriptor {
    fn from(song: Song) -> Self {
        Self {
            id: song.id,
            title: song.title,
            artist: song.artist,
            album: song.album,
            album_id: song.album_id,
            year: (song.year > 0).then_some(song.year),
            duration_ms: song.duration * 1000,
            format: song.suffix.to_ascii_lowercase(),
        }
    }
}
