// ABOUTME: Per-user locations for the config file and rolling log files
// ABOUTME: Resolved through the platform's XDG-style dirs with local fallbacks

use directories::ProjectDirs;
use std::path::PathBuf;

const CONFIG_FILE_NAME: &str = "config.toml";

fn dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "slackbot", "slackbot")
}

/// Config file consulted after `SLACKBOT_CONFIG_PATH` and `./config.toml`,
/// e.g. `~/.config/slackbot/config.toml`. Falls back to the working directory.
pub fn config_file() -> PathBuf {
    dirs()
        .map(|d| d.config_dir().join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Where `logging.file = true` writes `slackbot.log.<date>`,
/// e.g. `~/.local/share/slackbot/logs`.
pub fn log_dir() -> PathBuf {
    dirs()
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
