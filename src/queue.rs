//! The playback queue.
//!
//! An ordered list of tracks with two independent positions: `current`, the
//! entry assigned to playback, and `cursor`, the entry selected on screen.
//! Moving the cursor never touches playback; reordering keeps `current`
//! pointing at the same logical track.

use crate::track::TrackDescriptor;

/// Result of [`Queue::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub track: TrackDescriptor,
    /// The removed entry was the one playing; `current` is now unset and the
    /// caller decides whether to stop or advance.
    pub was_current: bool,
}

#[derive(Debug, Default)]
pub struct Queue {
    tracks: Vec<TrackDescriptor>,
    current: Option<usize>,
    cursor: usize,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the old contents and install `tracks`, with both `current` and
    /// `cursor` at `start`.
    ///
    /// An empty list or an out-of-range `start` leaves nothing current.
    pub fn replace(&mut self, tracks: Vec<TrackDescriptor>, start: usize) {
        self.tracks = tracks;
        if start < self.tracks.len() {
            self.current = Some(start);
            self.cursor = start;
        } else {
            self.current = None;
            self.cursor = self.tracks.len().saturating_sub(1);
        }
        self.check();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of entries from the current one to the end (everything when
    /// nothing is current).
    pub fn remaining(&self) -> usize {
        self.tracks.len() - self.current.unwrap_or(0)
    }

    pub fn current(&self) -> Option<&TrackDescriptor> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Advance `current` and return the new current track.
    ///
    /// With nothing current this starts from the first entry. Past the last
    /// entry it unsets `current` and returns `None`; it never wraps from the
    /// last entry back to the first.
    pub fn next(&mut self) -> Option<&TrackDescriptor> {
        let next = self.current.map_or(0, |i| i + 1);
        if next < self.tracks.len() {
            self.current = Some(next);
            self.check();
            self.tracks.get(next)
        } else {
            self.current = None;
            None
        }
    }

    /// Make the entry under the cursor current and return it.
    pub fn jump_to(&mut self) -> Option<&TrackDescriptor> {
        if self.cursor >= self.tracks.len() {
            return None;
        }
        self.current = Some(self.cursor);
        self.check();
        self.tracks.get(self.cursor)
    }

    /// Remove the entry under the cursor.
    pub fn remove(&mut self) -> Option<Removed> {
        if self.cursor >= self.tracks.len() {
            return None;
        }

        let at = self.cursor;
        let track = self.tracks.remove(at);
        let was_current = self.current == Some(at);

        self.current = match self.current {
            Some(c) if c > at => Some(c - 1),
            Some(c) if c == at => None,
            other => other,
        };

        if self.cursor >= self.tracks.len() {
            self.cursor = self.tracks.len().saturating_sub(1);
        }
        self.check();

        Some(Removed { track, was_current })
    }

    /// Swap the entry under the cursor with the one above it; the cursor
    /// follows the moved entry.
    pub fn move_up(&mut self) {
        if self.cursor == 0 || self.cursor >= self.tracks.len() {
            return;
        }
        self.swap(self.cursor, self.cursor - 1);
        self.cursor -= 1;
        self.check();
    }

    /// Swap the entry under the cursor with the one below it; the cursor
    /// follows the moved entry.
    pub fn move_down(&mut self) {
        if self.cursor + 1 >= self.tracks.len() {
            return;
        }
        self.swap(self.cursor, self.cursor + 1);
        self.cursor += 1;
        self.check();
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_down(&mut self) {
        if self.cursor + 1 < self.tracks.len() {
            self.cursor += 1;
        }
    }

    pub fn cursor_top(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_bottom(&mut self) {
        self.cursor = self.tracks.len().saturating_sub(1);
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.tracks.swap(a, b);
        self.current = match self.current {
            Some(c) if c == a => Some(b),
            Some(c) if c == b => Some(a),
            other => other,
        };
    }

    /// `current` is unset or in range; `cursor` is in range (0 when empty).
    pub fn invariant_holds(&self) -> bool {
        let len = self.tracks.len();
        let current_ok = self.current.is_none_or(|c| c < len);
        let cursor_ok = if len == 0 { self.cursor == 0 } else { self.cursor < len };
        current_ok && cursor_ok
    }

    fn check(&self) {
        debug_assert!(
            self.invariant_holds(),
            "queue invariant broken: len={} current={:?} cursor={}",
            self.tracks.len(),
            self.current,
            self.cursor
        );
    }
}
