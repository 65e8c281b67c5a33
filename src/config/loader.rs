//! Configuration loading and saving.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::schema::Config;

/// Path to the config file.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Data directory (`~/.pickbot`), also home to the job store.
pub fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pickbot")
}

/// Load config from the given path (or the default location), then apply
/// environment overrides for the Slack credentials.
pub fn load_config(path: Option<&Path>) -> Config {
    let path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
    let mut config = if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Invalid config at {}: {}", path.display(), e);
                Config::default()
            }),
            Err(e) => {
                warn!("Cannot read config at {}: {}", path.display(), e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Ok(token) = std::env::var("SLACK_BOT_TOKEN") {
        config.slack.bot_token = token;
    }
    if let Ok(secret) = std::env::var("SLACK_SIGNING_SECRET") {
        config.slack.signing_secret = secret;
    }

    config
}

/// Write config to the given path (or the default location).
pub fn save_config(config: &Config, path: Option<&Path>) {
    let path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    match serde_json::to_string_pretty(config) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&path, json) {
                warn!("Failed to save config: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize config: {}", e),
    }
}
