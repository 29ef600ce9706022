use tracing::warn;

use crate::config;

/// Load settings, falling back to defaults when the file or environment is
/// unusable. Runs before logging is up, so problems go to stderr as well.
pub fn load_settings() -> config::Settings {
    match config::Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                eprintln!("subtune: invalid config, using defaults: {msg}");
                config::Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            // Config is optional; failures should not prevent the app from starting.
            eprintln!("subtune: failed to load config, using defaults: {e}");
            config::Settings::default()
        }
    }
}

/// Write the effective settings to the config path and report where.
pub fn write_config(settings: &config::Settings) -> Result<(), Box<dyn std::error::Error>> {
    let path = config::resolve_config_path().ok_or("no config path: set HOME or SUBTUNE_CONFIG_PATH")?;
    if path.exists() {
        warn!(path = %path.display(), "refusing to overwrite config");
        return Err(format!("{} already exists", path.display()).into());
    }
    settings.save(&path)?;
    println!("subtune: wrote {}", path.display());
    Ok(())
}
