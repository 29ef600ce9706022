//! Track descriptors shared by the queue, the controller and the UI.

use std::time::Duration;

/// Everything the player needs to know about one streamable track.
///
/// Descriptors are immutable once they enter the queue; the queue entry owns
/// its descriptor and the controller keeps a cloned snapshot while playing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackDescriptor {
    /// Server-side identifier used to open the stream.
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_id: String,
    pub year: Option<u32>,
    pub duration_ms: u64,
    /// Lowercase source format label as reported by the server (`mp3`, `flac`, ...).
    pub format: String,
}

impl TrackDescriptor {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// `Artist — Album (Year)`, skipping whatever is missing.
    pub fn album_line(&self) -> String {
        let mut line = self.artist.trim().to_string();
        let album = self.album.trim();
        if !album.is_empty() {
            if !line.is_empty() {
                line.push_str(" — ");
            }
            line.push_str(album);
        }
        if let Some(year) = self.year.filter(|y| *y > 0) {
            line.push_str(&format!(" ({year})"));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn album_line_skips_missing_parts() {
        let mut t = TrackDescriptor {
            artist: "Boards of Canada".into(),
            album: "Geogaddi".into(),
            year: Some(2002),
            ..Default::default()
        };
        assert_eq!(t.album_line(), "Boards of Canada — Geogaddi (2002)");

        t.year = None;
        t.artist.clear();
        assert_eq!(t.album_line(), "Geogaddi");
    }
}
