//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use crate::app::{App, StatusKind};
use crate::audio::{AudioOutput, PlaybackPhase};
use crate::config::{TimeField, UiSettings};
use crate::orchestrator::Orchestrator;
use crate::queue::Queue;
use crate::track::TrackDescriptor;

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();
    map.insert("j/k", "up/down");
    map.insert("J/K", "move track");
    map.insert("g/G", "top/bottom");
    map.insert("enter", "play selected");
    map.insert("space", "play/pause");
    map.insert("n", "next");
    map.insert("x", "remove");
    map.insert("s", "stop");
    map.insert("q", "quit");
    map
});

fn controls_text() -> String {
    // Rendered order, not map order.
    let order = ["j/k", "g/G", "J/K", "enter", "space", "n", "x", "s", "q"];
    order
        .iter()
        .filter_map(|k| CONTROLS_MAP.get(k).map(|v| format!("[{k}] {v}")))
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
pub(crate) fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Build the now-playing time text (elapsed/total/remaining) per `UiSettings`.
///
/// A zero `total` means the server did not report a duration; the total and
/// remaining fields are left out then.
pub(crate) fn now_playing_time_text(
    elapsed: Duration,
    total: Duration,
    ui: &UiSettings,
) -> Option<String> {
    let total = (!total.is_zero()).then_some(total);
    let mut parts: Vec<String> = Vec::new();
    for f in &ui.now_playing_time_fields {
        match f {
            TimeField::Elapsed => parts.push(format_mmss(elapsed)),
            TimeField::Total => {
                if let Some(t) = total {
                    parts.push(format_mmss(t));
                }
            }
            TimeField::Remaining => {
                if let Some(t) = total {
                    parts.push(format!("-{}", format_mmss(t.saturating_sub(elapsed))));
                }
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(&ui.now_playing_time_separator))
    }
}

/// Fraction of the track played, clamped to `0.0..=1.0`.
pub(crate) fn progress_ratio(elapsed: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
}

/// Visible `[start, end)` window of `total` rows that keeps `selected` centred
/// when the list is taller than `height`. Returns the window and the
/// selected row's offset inside it.
pub(crate) fn visible_window(total: usize, height: usize, selected: usize) -> (usize, usize, usize) {
    if total <= height || height == 0 {
        return (0, total, selected);
    }
    let half = height / 2;
    let mut start = selected.saturating_sub(half);
    if start + height > total {
        start = total - height;
    }
    (start, start + height, selected - start)
}

pub(crate) fn queue_row(track: &TrackDescriptor, is_current: bool, ui: &UiSettings) -> String {
    let marker = if is_current { "▶ " } else { "  " };
    let mut row = format!("{marker}{}", track.title);
    if ui.show_album_in_queue {
        let line = track.album_line();
        if !line.is_empty() {
            row.push_str("  ·  ");
            row.push_str(&line);
        }
    }
    if track.duration_ms > 0 {
        row.push_str(&format!("  [{}]", format_mmss(track.duration())));
    }
    row
}

fn left_pad() -> Padding {
    Padding {
        left: 1,
        right: 0,
        top: 0,
        bottom: 0,
    }
}

/// Render the entire UI into the provided `frame`.
pub fn draw<O: AudioOutput>(
    frame: &mut Frame,
    app: &App,
    orchestrator: &Orchestrator<O>,
    ui_settings: &UiSettings,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" subtune ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    draw_now_playing(frame, chunks[1], orchestrator, ui_settings);
    draw_queue(frame, chunks[2], app, orchestrator.queue(), ui_settings);

    let (status_text, status_style) = match &app.status {
        Some(s) if s.kind == StatusKind::Error => (s.text.as_str(), Style::default().fg(Color::Red)),
        Some(s) => (s.text.as_str(), Style::default()),
        None => ("", Style::default()),
    };
    let status = Paragraph::new(status_text)
        .style(status_style)
        .block(Block::bordered().padding(left_pad()).title(" status "));
    frame.render_widget(status, chunks[3]);

    let footer = Paragraph::new(controls_text())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(left_pad()),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[4]);
}

fn draw_now_playing<O: AudioOutput>(
    frame: &mut Frame,
    area: Rect,
    orchestrator: &Orchestrator<O>,
    ui: &UiSettings,
) {
    let controller = orchestrator.controller();
    let phase = controller.phase();
    let title = match phase {
        PlaybackPhase::Idle => " stopped ",
        PlaybackPhase::Loading => " loading ",
        PlaybackPhase::Playing => " playing ",
        PlaybackPhase::Paused => " paused ",
    };
    let block = Block::bordered().padding(left_pad()).title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let Some(now) = controller.current() else {
        frame.render_widget(Paragraph::new("Nothing playing").dim(), rows[0]);
        return;
    };

    let icon = if phase == PlaybackPhase::Paused { "⏸" } else { "♪" };
    let title = Paragraph::new(format!("{icon} {}", now.track.title)).bold();
    frame.render_widget(title, rows[0]);
    frame.render_widget(Paragraph::new(now.track.album_line()), rows[1]);

    let elapsed = Duration::from_secs_f64(controller.elapsed().max(0.0));
    let total = now.track.duration();
    let label = now_playing_time_text(elapsed, total, ui).unwrap_or_default();
    let color = if phase == PlaybackPhase::Paused {
        Color::Yellow
    } else {
        Color::Green
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(color))
        .ratio(progress_ratio(elapsed, total))
        .label(label);
    frame.render_widget(gauge, rows[2]);
}

fn draw_queue(frame: &mut Frame, area: Rect, app: &App, queue: &Queue, ui: &UiSettings) {
    let total = queue.len();
    // Only build ListItems for the visible window.
    let height = area.height.saturating_sub(2) as usize;
    let (start, end, selected) = visible_window(total, height, queue.cursor());

    let current = queue.current_index();
    let items: Vec<ListItem> = queue.tracks()[start..end]
        .iter()
        .enumerate()
        .map(|(offset, track)| {
            let is_current = current == Some(start + offset);
            let item = ListItem::new(queue_row(track, is_current, ui));
            if is_current {
                item.style(Style::default().add_modifier(Modifier::BOLD))
            } else {
                item
            }
        })
        .collect();

    let mut title = format!(" queue ({}) ", queue.remaining());
    if !app.source.is_empty() {
        title.push_str(&format!("· {} ", app.source));
    }
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    if !queue.is_empty() {
        state.select(Some(selected));
    }
    frame.render_stateful_widget(list, area, &mut state);
}
