//! Application model types: `App`, `Status` and the key `Action`s.
//!
//! The `App` struct holds what the UI shows besides the queue and the
//! controller state: where the queue came from and the last status message.

use crossterm::event::KeyCode;

use crate::audio::{PlayerError, SessionEnd};

/// User commands the event loop understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    CursorDown,
    CursorUp,
    MoveDown,
    MoveUp,
    Top,
    Bottom,
    /// Play the entry under the cursor.
    Play,
    TogglePause,
    Next,
    Remove,
    Stop,
    Quit,
}

impl Action {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        let action = match code {
            KeyCode::Char('j') | KeyCode::Down => Self::CursorDown,
            KeyCode::Char('k') | KeyCode::Up => Self::CursorUp,
            KeyCode::Char('J') => Self::MoveDown,
            KeyCode::Char('K') => Self::MoveUp,
            KeyCode::Char('g') | KeyCode::Home => Self::Top,
            KeyCode::Char('G') | KeyCode::End => Self::Bottom,
            KeyCode::Enter => Self::Play,
            KeyCode::Char(' ') => Self::TogglePause,
            KeyCode::Char('n') => Self::Next,
            KeyCode::Char('x') | KeyCode::Delete => Self::Remove,
            KeyCode::Char('s') => Self::Stop,
            KeyCode::Char('q') | KeyCode::Esc => Self::Quit,
            _ => return None,
        };
        Some(action)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

/// The main application model.
#[derive(Debug, Default)]
pub struct App {
    /// Where the queue came from, e.g. `Album: Geogaddi`.
    pub source: String,
    pub status: Option<Status>,
}

impl App {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            status: None,
        }
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            kind: StatusKind::Info,
            text: text.into(),
        });
    }

    /// Show a playback error; benign ones (nothing playing) are dropped.
    pub fn report(&mut self, err: &PlayerError) {
        if err.is_benign() {
            return;
        }
        self.status = Some(Status {
            kind: StatusKind::Error,
            text: err.to_string(),
        });
    }

    /// Surface a track that stopped on an error instead of finishing.
    pub fn track_ended(&mut self, end: &SessionEnd) {
        if let Some(err) = end.error() {
            self.status = Some(Status {
                kind: StatusKind::Error,
                text: format!("track skipped: {err}"),
            });
        }
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn has_error(&self) -> bool {
        matches!(
            self.status,
            Some(Status {
                kind: StatusKind::Error,
                ..
            })
        )
    }
}
