// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates Slack tokens and provides defaults for logging and bot identity
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackConfig>,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

// ─── SlackConfig ────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...) for Web API calls
    pub bot_token: String,
    /// App-level token (xapp-...) for Socket Mode connections
    pub app_token: String,
    /// Drop messages authored by the bot's own user
    #[serde(default = "default_true")]
    pub skip_own_messages: bool,
}

// Custom Debug impl to redact app_token and bot_token
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .field("skip_own_messages", &self.skip_own_messages)
            .finish()
    }
}

// ─── BotConfig ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Display name used as `from` when the CLI posts without one
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
        }
    }
}

// ─── LoggingConfig ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Verbose logging for the bot's own targets
    #[serde(default)]
    pub debug: bool,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json: bool,
    /// Also write a daily rolling log file under the data directory
    #[serde(default)]
    pub file: bool,
}

// ─── MetricsConfig ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics on this address (e.g. "127.0.0.1:9100")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<SocketAddr>,
}

fn default_true() -> bool {
    true
}

fn default_display_name() -> String {
    "slackbot".to_string()
}

fn parse_bool(name: &str, val: &str) -> Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be a boolean, got: {}", name, val),
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. SLACKBOT_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/slackbot/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("SLACKBOT_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let bot_token = std::env::var("SLACK_BOT_TOKEN").ok();
        let app_token = std::env::var("SLACK_APP_TOKEN").ok();

        match (&mut self.slack, bot_token, app_token) {
            (Some(slack), bot_token, app_token) => {
                if let Some(val) = bot_token {
                    slack.bot_token = val;
                }
                if let Some(val) = app_token {
                    slack.app_token = val;
                }
            }
            // Both tokens in the environment are enough to enable Slack without a file
            (None, Some(bot_token), Some(app_token)) => {
                self.slack = Some(SlackConfig {
                    bot_token,
                    app_token,
                    skip_own_messages: true,
                });
            }
            _ => {}
        }

        if let Ok(val) = std::env::var("SLACKBOT_DISPLAY_NAME") {
            self.bot.display_name = val;
        }
        if let Ok(val) = std::env::var("SLACKBOT_DEBUG") {
            self.logging.debug = parse_bool("SLACKBOT_DEBUG", &val)?;
        }
        if let Ok(val) = std::env::var("SLACKBOT_LOG_JSON") {
            self.logging.json = parse_bool("SLACKBOT_LOG_JSON", &val)?;
        }
        if let Ok(val) = std::env::var("SLACKBOT_METRICS_ADDR") {
            let addr = val
                .trim()
                .parse()
                .with_context(|| format!("SLACKBOT_METRICS_ADDR is not a socket address: {}", val))?;
            self.metrics.listen_addr = Some(addr);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.bot.display_name.trim().is_empty() {
            anyhow::bail!("bot.display_name must not be empty");
        }

        if let Some(ref mut slack) = self.slack {
            slack.bot_token = slack.bot_token.trim().to_string();
            slack.app_token = slack.app_token.trim().to_string();
            if !slack.bot_token.starts_with("xoxb-") {
                anyhow::bail!(
                    "slack.bot_token must be a bot token starting with 'xoxb-' (set in config.toml or SLACK_BOT_TOKEN env var)"
                );
            }
            if !slack.app_token.starts_with("xapp-") {
                anyhow::bail!(
                    "slack.app_token must be an app-level token starting with 'xapp-' (set in config.toml or SLACK_APP_TOKEN env var)"
                );
            }
        }
        Ok(())
    }

    /// Get the Slack config, returning an error if not configured.
    pub fn slack_config(&self) -> Result<&SlackConfig> {
        self.slack.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "Slack configuration is required: add a [slack] section or set SLACK_BOT_TOKEN and SLACK_APP_TOKEN"
            )
        })
    }
}
