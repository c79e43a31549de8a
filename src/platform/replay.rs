// ABOUTME: Scripted transport that replays raw events from a TOML file
// ABOUTME: Serves lookups from the script's directory tables and records outgoing posts

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slackbot_core::{
    ChannelDirectory, ChannelInfo, EventSource, MessageSink, OutgoingMessage, RawEvent,
    RawEventStream, Transport, UserDirectory, UserInfo,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// A recorded session: raw events in arrival order plus the directory the
/// lookups should see.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub events: Vec<RawEvent>,
    /// Channel id -> channel name
    #[serde(default)]
    pub channels: HashMap<String, String>,
    /// User id -> user record
    #[serde(default)]
    pub users: HashMap<String, UserInfo>,
}

impl ReplayScript {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse replay script")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}

/// Transport that plays back a [`ReplayScript`] once.
pub struct ReplayTransport {
    events: Mutex<Option<Vec<RawEvent>>>,
    channels: HashMap<String, String>,
    users: HashMap<String, UserInfo>,
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl ReplayTransport {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            events: Mutex::new(Some(script.events)),
            channels: script.channels,
            users: script.users,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages posted through this transport, in write order.
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventSource for ReplayTransport {
    async fn connect(&self) -> Result<RawEventStream> {
        let events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("replay event lock poisoned"))?
            .take()
            .context("Replay script already consumed")?;

        tracing::info!(events = events.len(), "Replaying scripted events");
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

#[async_trait]
impl ChannelDirectory for ReplayTransport {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        self.channels
            .get(channel_id)
            .map(|name| ChannelInfo::new(name.clone()))
            .ok_or_else(|| anyhow::anyhow!("channel_not_found"))
    }
}

#[async_trait]
impl UserDirectory for ReplayTransport {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("user_not_found"))
    }
}

#[async_trait]
impl MessageSink for ReplayTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        tracing::info!(
            platform = "replay",
            channel = %message.channel,
            from = %message.from,
            "Recording outgoing message"
        );
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("replay send lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

impl Transport for ReplayTransport {
    fn transport_id(&self) -> &'static str {
        "replay"
    }
}
