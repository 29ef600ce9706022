mod app;
mod audio;
mod config;
mod orchestrator;
mod queue;
mod runtime;
mod subsonic;
mod track;
mod ui;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
