use std::time::Duration;

use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::debug;

use crate::app::{Action, App};
use crate::audio::{AudioOutput, SessionEnd};
use crate::config;
use crate::orchestrator::{Advance, Orchestrator};
use crate::ui;

/// Main terminal event loop: handles input, UI drawing and track ends
/// forwarded by the end watcher. Returns `Ok(())` when shutdown is requested.
pub fn run<O: AudioOutput>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    orchestrator: &mut Orchestrator<O>,
    track_ends: &Receiver<SessionEnd>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        while let Ok(end) = track_ends.try_recv() {
            on_track_end(&end, app, orchestrator);
        }

        terminal.draw(|f| ui::draw(f, app, orchestrator, &settings.ui))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key_event(key, app, orchestrator) {
                    return Ok(());
                }
            }
        }
    }
}

fn on_track_end<O: AudioOutput>(end: &SessionEnd, app: &mut App, orchestrator: &mut Orchestrator<O>) {
    app.track_ended(end);
    match orchestrator.handle_track_end(end) {
        Ok(Advance::Idle) if !app.has_error() => app.notify("end of queue"),
        Ok(advance) => debug!(?advance, session = end.session(), "track end handled"),
        Err(e) => app.report(&e),
    }
}

/// Returns `true` when the user asked to quit.
fn handle_key_event<O: AudioOutput>(key: KeyEvent, app: &mut App, orchestrator: &mut Orchestrator<O>) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    let Some(action) = Action::from_key(key.code) else {
        return false;
    };

    match action {
        Action::Quit => return true,
        Action::CursorDown => orchestrator.cursor_down(),
        Action::CursorUp => orchestrator.cursor_up(),
        Action::MoveDown => orchestrator.move_down(),
        Action::MoveUp => orchestrator.move_up(),
        Action::Top => orchestrator.cursor_top(),
        Action::Bottom => orchestrator.cursor_bottom(),
        Action::Play => {
            app.clear_status();
            if let Err(e) = orchestrator.jump_to() {
                app.report(&e);
            }
        }
        Action::TogglePause => {
            orchestrator.toggle_pause();
        }
        Action::Next => {
            app.clear_status();
            match orchestrator.skip() {
                Ok(Advance::Idle) => app.notify("end of queue"),
                Ok(_) => {}
                Err(e) => app.report(&e),
            }
        }
        Action::Remove => {
            if let Some(removed) = orchestrator.remove_selected() {
                app.notify(format!("removed {}", removed.track.title));
            }
        }
        Action::Stop => {
            app.clear_status();
            orchestrator.stop();
        }
    }
    false
}
