// ABOUTME: In-memory collaborators for exercising the pipeline without a live transport
// ABOUTME: MockDirectory counts lookups per id; MockSink records sends; MockTransport combines both

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::events::{OutgoingMessage, RawEvent};
use crate::traits::{
    ChannelDirectory, ChannelInfo, EventSource, MessageSink, RawEventStream, Transport,
    UserDirectory, UserInfo,
};

/// Channel and user directory backed by fixed maps.
///
/// Ids that were not registered fail with `channel_not_found` /
/// `user_not_found`, the same error strings the Slack Web API returns.
#[derive(Default)]
pub struct MockDirectory {
    channels: HashMap<String, String>,
    users: HashMap<String, UserInfo>,
    channel_calls: Mutex<HashMap<String, usize>>,
    user_calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, id: &str, name: &str) -> Self {
        self.channels.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_user(mut self, id: &str, name: &str) -> Self {
        self.users.insert(id.to_string(), UserInfo::human(name));
        self
    }

    pub fn with_bot(mut self, id: &str, name: &str) -> Self {
        self.users.insert(id.to_string(), UserInfo::bot(name));
        self
    }

    /// Sleep before answering each lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of channel lookups made for `id`.
    pub fn channel_calls(&self, id: &str) -> usize {
        self.channel_calls
            .lock()
            .map(|calls| calls.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of user lookups made for `id`.
    pub fn user_calls(&self, id: &str) -> usize {
        self.user_calls
            .lock()
            .map(|calls| calls.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total lookups of either kind.
    pub fn total_calls(&self) -> usize {
        let channels: usize = self
            .channel_calls
            .lock()
            .map(|c| c.values().sum())
            .unwrap_or(0);
        let users: usize = self
            .user_calls
            .lock()
            .map(|c| c.values().sum())
            .unwrap_or(0);
        channels + users
    }

    fn record(calls: &Mutex<HashMap<String, usize>>, id: &str) {
        if let Ok(mut calls) = calls.lock() {
            *calls.entry(id.to_string()).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl ChannelDirectory for MockDirectory {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        Self::record(&self.channel_calls, channel_id);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.channels.get(channel_id) {
            Some(name) => Ok(ChannelInfo::new(name.clone())),
            None => anyhow::bail!("channel_not_found"),
        }
    }
}

#[async_trait]
impl UserDirectory for MockDirectory {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        Self::record(&self.user_calls, user_id);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.users.get(user_id) {
            Some(info) => Ok(info.clone()),
            None => anyhow::bail!("user_not_found"),
        }
    }
}

/// Write path that records every message it accepts.
#[derive(Default)]
pub struct MockSink {
    sent: Mutex<Vec<OutgoingMessage>>,
    failing_channels: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every send to `channel`.
    pub fn failing_on(mut self, channel: &str) -> Self {
        self.failing_channels.insert(channel.to_string());
        self
    }

    /// Hold each write open for `delay` before completing it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Messages successfully written, in write order.
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Highest number of writes observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSink for MockSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing_channels.contains(&message.channel) {
            Err(anyhow::anyhow!("channel_not_found"))
        } else {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message.clone());
            }
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Transport assembled from a [`MockDirectory`] and a [`MockSink`], with raw
/// events pushed live through the feeder from [`MockTransport::take_feeder`].
pub struct MockTransport {
    pub directory: MockDirectory,
    pub sink: MockSink,
    feeder: Mutex<Option<mpsc::UnboundedSender<RawEvent>>>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<RawEvent>>>,
    fail_connect: bool,
}

impl MockTransport {
    pub fn new(directory: MockDirectory, sink: MockSink) -> Self {
        let (feeder, inbound) = mpsc::unbounded_channel();
        Self {
            directory,
            sink,
            feeder: Mutex::new(Some(feeder)),
            inbound: Mutex::new(Some(inbound)),
            fail_connect: false,
        }
    }

    /// Make `connect` fail.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Take the handle for pushing raw events into the connected stream.
    /// Dropping it ends the stream.
    pub fn take_feeder(&self) -> Option<mpsc::UnboundedSender<RawEvent>> {
        self.feeder.lock().ok().and_then(|mut f| f.take())
    }
}

#[async_trait]
impl EventSource for MockTransport {
    async fn connect(&self) -> Result<RawEventStream> {
        if self.fail_connect {
            anyhow::bail!("invalid_auth");
        }
        let inbound = self
            .inbound
            .lock()
            .ok()
            .and_then(|mut rx| rx.take())
            .ok_or_else(|| anyhow::anyhow!("mock transport already connected"))?;
        Ok(Box::pin(UnboundedReceiverStream::new(inbound)))
    }
}

#[async_trait]
impl ChannelDirectory for MockTransport {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        self.directory.channel_info(channel_id).await
    }
}

#[async_trait]
impl UserDirectory for MockTransport {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        self.directory.user_info(user_id).await
    }
}

#[async_trait]
impl MessageSink for MockTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        self.sink.send(message).await
    }
}

impl Transport for MockTransport {
    fn transport_id(&self) -> &'static str {
        "mock"
    }
}
