use std::{env, fs, io, path::Path, path::PathBuf};

use crate::audio::is_known_format;

use super::schema::Settings;

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `SUBTUNE__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("SUBTUNE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("audio.transcode_formats")
                .with_list_parse_key("ui.now_playing_time_fields"),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.audio.output_sample_rate == 0 {
            return Err("audio.output_sample_rate must be > 0".to_string());
        }
        if !is_known_format(&self.audio.fallback_format) {
            return Err(format!(
                "audio.fallback_format {:?} has no decoder",
                self.audio.fallback_format
            ));
        }
        if self.audio.stream_timeout_secs == 0 {
            return Err("audio.stream_timeout_secs must be >= 1".to_string());
        }
        if self.server.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs must be >= 1".to_string());
        }
        Ok(())
    }

    /// Write these settings as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let text = toml::to_string_pretty(self).map_err(io::Error::other)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, text)
    }
}

/// Resolve the config path from `SUBTUNE_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("SUBTUNE_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/subtune/config.toml`
/// or `~/.config/subtune/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else if let Some(home) = env::var_os("HOME") {
        Some(PathBuf::from(home).join(".config"))
    } else {
        None
    };

    config_home.map(|d| d.join("subtune").join("config.toml"))
}
