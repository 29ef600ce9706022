use serde::{Deserialize, Serialize};

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/subtune/config.toml` or `~/.config/subtune/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `SUBTUNE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub audio: AudioSettings,
    pub ui: UiSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL of the Subsonic-compatible server, e.g. `https://music.example.com`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Sent as the `c` parameter and in the user agent.
    pub client_name: String,
    /// Subsonic REST API version (`v` parameter).
    pub api_version: String,
    /// Timeout for API calls (seconds). Streams use `audio.stream_timeout_secs`.
    pub request_timeout_secs: u64,
    /// How many songs to queue when no album is given.
    pub random_songs: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            client_name: "subtune".to_string(),
            api_version: "1.16.1".to_string(),
            request_timeout_secs: 30,
            random_songs: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Rate the output device runs at; sources at other rates are resampled.
    pub output_sample_rate: u32,
    /// Decoder used for formats without one of their own (assumed transcoded
    /// by the server).
    pub fallback_format: String,
    /// Upper bound for opening a stream (seconds).
    pub stream_timeout_secs: u64,
    /// Source formats the server is asked to transcode.
    pub transcode_formats: Vec<String>,
    /// Format requested for `transcode_formats`.
    pub transcode_target: String,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            output_sample_rate: 44_100,
            fallback_format: "mp3".to_string(),
            stream_timeout_secs: 30,
            transcode_formats: vec!["m4a".into(), "aac".into(), "wma".into()],
            transcode_target: "mp3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UiSettings {
    /// The text rendered inside the top header box.
    pub header_text: String,

    /// Whether queue rows show `artist — album` after the title.
    pub show_album_in_queue: bool,

    /// Which time fields to show in the now-playing panel, and in what order.
    ///
    /// Example: ["elapsed", "total", "remaining"]
    pub now_playing_time_fields: Vec<TimeField>,

    /// Separator used to join `now_playing_time_fields`.
    pub now_playing_time_separator: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            header_text: " ~ subtune ~ ".to_string(),
            show_album_in_queue: true,
            now_playing_time_fields: vec![TimeField::Elapsed, TimeField::Total],
            now_playing_time_separator: " / ".to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeField {
    Elapsed,
    Total,
    Remaining,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `info` or `subtune=debug`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
