use std::env;
use std::sync::Arc;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

use crate::app::App;
use crate::audio::{Controller, RodioOutput, SessionEnd};
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, TranscodePolicy, spawn_end_watcher};
use crate::subsonic::SubsonicClient;
use crate::track::TrackDescriptor;

mod event_loop;
mod logging;
mod settings;

/// Command line: `subtune [--write-config] [ALBUM_ID]`.
struct Args {
    write_config: bool,
    album_id: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            write_config: false,
            album_id: None,
        };
        for arg in env::args().skip(1) {
            if arg == "--write-config" {
                args.write_config = true;
            } else if args.album_id.is_none() {
                args.album_id = Some(arg);
            }
        }
        args
    }
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings::load_settings();
    let args = Args::parse();

    if args.write_config {
        return settings::write_config(&settings);
    }
    if settings.server.url.trim().is_empty() {
        return Err("server.url is not set (try `subtune --write-config`)".into());
    }

    if let Some(path) = logging::init(&settings.logging) {
        info!(log = %path.display(), "subtune starting");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let client = SubsonicClient::new(
        &settings.server,
        Duration::from_secs(settings.audio.stream_timeout_secs),
        runtime.handle().clone(),
    )?;
    runtime.block_on(client.ping())?;

    let (source, tracks) = fetch_queue(&runtime, &client, &settings, args.album_id.as_deref())?;
    info!(%source, tracks = tracks.len(), "queue loaded");

    let output = RodioOutput::open_default(settings.audio.output_sample_rate)?;
    let controller = Controller::new(output, settings.audio.fallback_format.clone());
    let done = controller.done();

    let client = Arc::new(client);
    let transcode = TranscodePolicy {
        formats: settings.audio.transcode_formats.clone(),
        target: settings.audio.transcode_target.clone(),
    };
    let mut orchestrator = Orchestrator::new(controller, client.clone(), client, transcode);
    let mut app = App::new(source);

    if tracks.is_empty() {
        app.notify("nothing to play");
    } else if let Err(e) = orchestrator.play_queue(tracks, 0) {
        error!(%e, "first track failed");
        app.report(&e);
    }

    let (events_tx, events_rx) = crossbeam_channel::unbounded::<SessionEnd>();
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
    let watcher = spawn_end_watcher(done, shutdown_rx, events_tx)?;

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = event_loop::run(&mut terminal, &settings, &mut app, &mut orchestrator, &events_rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    orchestrator.stop();
    drop(shutdown_tx);
    if watcher.join().is_err() {
        error!("end watcher panicked");
    }
    info!("subtune exiting");

    run_result
}

/// Tracks for the queue and a label saying where they came from.
fn fetch_queue(
    runtime: &tokio::runtime::Runtime,
    client: &SubsonicClient,
    settings: &Settings,
    album_id: Option<&str>,
) -> Result<(String, Vec<TrackDescriptor>), Box<dyn std::error::Error>> {
    match album_id {
        Some(id) => {
            let tracks = runtime.block_on(client.get_album(id))?;
            let label = tracks
                .first()
                .map(|t| format!("Album: {}", t.album))
                .unwrap_or_else(|| format!("Album: {id}"));
            Ok((label, tracks))
        }
        None => {
            let tracks = runtime.block_on(client.get_random_songs(settings.server.random_songs))?;
            Ok(("Random songs".to_string(), tracks))
        }
    }
}
