// ABOUTME: Main entry point for the Slack bot bridge
// ABOUTME: Initializes logging and config, then runs, replays, or posts through the pipeline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use slackbot::{
    config::{Config, LoggingConfig},
    paths,
    platform::{ReplayScript, ReplayTransport},
    BotEvent, SlackBot,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "slackbot", about = "Slack bot bridge: normalized chat events in, plain-text posts out")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level filter (e.g. "info", "debug"). RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Slack, print normalized events as JSON lines, and post
    /// "<channel> <text>" lines read from stdin (default).
    Run,
    /// Replay a scripted session and print the normalized events.
    Replay {
        /// TOML script with events, channels, and users tables
        script: PathBuf,
    },
    /// Post a single plain-text message.
    Send {
        /// Display name to post as (defaults to bot.display_name)
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        channel: String,
        #[arg(short, long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = Config::load()?;
    let _log_guard = init_logging(&config.logging, &cli);

    tracing::info!(
        slack = config.slack.is_some(),
        display_name = %config.bot.display_name,
        debug = config.logging.debug,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics.listen_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        tracing::info!(addr = %addr, "Serving Prometheus metrics");
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Replay { script } => replay(&script).await,
        Commands::Send { from, channel, text } => {
            let from = from.unwrap_or_else(|| config.bot.display_name.clone());
            send(&config, from, channel, text).await
        }
    }
}

/// Set up stderr logging (stdout carries events) plus an optional rolling file.
fn init_logging(logging: &LoggingConfig, cli: &Cli) -> Option<WorkerGuard> {
    let default_filter = match (&cli.log_level, logging.debug) {
        (Some(level), _) => level.clone(),
        (None, true) => "info,slackbot=debug,slackbot_core=debug".to_string(),
        (None, false) => "info".to_string(),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = if cli.json_logs || logging.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = if logging.file {
        let appender = tracing_appender::rolling::daily(paths::log_dir(), "slackbot.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

/// Render a normalized event as one JSON line for stdout.
fn event_to_json(event: &BotEvent) -> serde_json::Value {
    match event {
        BotEvent::Connected => serde_json::json!({ "type": "connected" }),
        BotEvent::Message(msg) => serde_json::json!({
            "type": "message",
            "sender": msg.sender,
            "channel": msg.channel,
            "text": msg.text,
            "is_bot": msg.is_bot,
        }),
        BotEvent::Error(e) => serde_json::json!({
            "type": "error",
            "kind": e.kind(),
            "message": e.to_string(),
        }),
    }
}

#[cfg(feature = "slack")]
async fn run(config: &Config) -> Result<()> {
    use slackbot::platform::SlackTransport;
    use tokio::io::{AsyncBufReadExt, BufReader};

    let slack_config = config.slack_config()?;
    let transport = Arc::new(SlackTransport::new(slack_config).await?);

    let mut bot = SlackBot::new(Arc::clone(&transport));
    if slack_config.skip_own_messages {
        bot = bot.with_self_user_id(transport.bot_user_id());
    }
    let mut handle = bot.start().await.context("Failed to start bot session")?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else {
                    tracing::info!("Event stream ended");
                    break;
                };
                println!("{}", event_to_json(&event));
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let Some((channel, text)) = line.trim().split_once(' ') else {
                            tracing::warn!(line = %line, "Expected \"<channel> <text>\"");
                            continue;
                        };
                        handle.send_message(&config.bot.display_name, channel, text.trim())?;
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin, no longer posting");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

#[cfg(not(feature = "slack"))]
async fn run(_config: &Config) -> Result<()> {
    anyhow::bail!("slackbot was built without the `slack` feature")
}

async fn replay(script_path: &std::path::Path) -> Result<()> {
    let script = ReplayScript::from_file(script_path)?;
    let transport = Arc::new(ReplayTransport::new(script));

    let mut handle = SlackBot::new(Arc::clone(&transport))
        .start()
        .await
        .context("Failed to start replay session")?;

    while let Some(event) = handle.next_event().await {
        println!("{}", event_to_json(&event));
    }

    handle.shutdown().await;
    Ok(())
}

#[cfg(feature = "slack")]
async fn send(config: &Config, from: String, channel: String, text: String) -> Result<()> {
    use slackbot::platform::SlackTransport;
    use slackbot_core::{MessageSink, OutgoingMessage};

    let transport = SlackTransport::new(config.slack_config()?).await?;
    let message = OutgoingMessage::new(from, channel, text);
    transport
        .send(&message)
        .await
        .with_context(|| format!("Failed to post to {}", message.channel))?;

    tracing::info!(channel = %message.channel, "Message posted");
    Ok(())
}

#[cfg(not(feature = "slack"))]
async fn send(_config: &Config, _from: String, _channel: String, _text: String) -> Result<()> {
    anyhow::bail!("slackbot was built without the `slack` feature")
}
