// ABOUTME: Collaborator contracts the pipeline consumes from a chat transport
// ABOUTME: Event source, channel/user directories, and the single outgoing write path

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::events::{OutgoingMessage, RawEvent};

// =============================================================================
// Directory records
// =============================================================================

/// Channel metadata returned by a channel-info lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// User metadata returned by a user-info lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub is_bot: bool,
}

impl UserInfo {
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_bot: false,
        }
    }

    pub fn bot(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_bot: true,
        }
    }
}

// =============================================================================
// Collaborators
// =============================================================================

/// Boxed stream of raw transport events. Lazy and effectively infinite.
pub type RawEventStream = Pin<Box<dyn Stream<Item = RawEvent> + Send>>;

/// Opens the transport's inbound event stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Connect and start delivering raw events. Called once per session.
    async fn connect(&self) -> Result<RawEventStream>;
}

/// Channel-info lookup.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo>;
}

/// User-info lookup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo>;
}

/// Transport write path. The dispatcher is its only caller.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<()>;
}

/// Lookups the identity cache needs. Blanket-implemented for anything that
/// provides both directories.
pub trait Directory: ChannelDirectory + UserDirectory {}

impl<T: ChannelDirectory + UserDirectory + ?Sized> Directory for T {}

/// A complete chat transport: inbound events, lookups and the write path.
///
/// Different protocol flavours (Socket Mode, scripted replay) implement this
/// same surface; the pipeline never branches on which one it has.
pub trait Transport: EventSource + ChannelDirectory + UserDirectory + MessageSink {
    /// Transport identifier (e.g., "slack", "replay")
    fn transport_id(&self) -> &'static str;
}

// =============================================================================
// Forwarding impls so shared handles can be passed where a collaborator is expected
// =============================================================================

#[async_trait]
impl<T: ChannelDirectory + ?Sized> ChannelDirectory for std::sync::Arc<T> {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        (**self).channel_info(channel_id).await
    }
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for std::sync::Arc<T> {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        (**self).user_info(user_id).await
    }
}

#[async_trait]
impl<T: MessageSink + ?Sized> MessageSink for std::sync::Arc<T> {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        (**self).send(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct StubDirectory;

    #[async_trait]
    impl ChannelDirectory for StubDirectory {
        async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
            Ok(ChannelInfo::new(format!("name-of-{}", channel_id)))
        }
    }

    #[async_trait]
    impl UserDirectory for StubDirectory {
        async fn user_info(&self, _user_id: &str) -> Result<UserInfo> {
            anyhow::bail!("stub")
        }
    }

    fn assert_directory<D: Directory>(_d: &D) {}

    #[test]
    fn test_user_info_constructors() {
        assert!(!UserInfo::human("alice").is_bot);
        assert!(UserInfo::bot("deploybot").is_bot);
    }

    #[test]
    fn test_user_info_is_bot_defaults_false() {
        let info: UserInfo = serde_json::from_str(r#"{"name":"alice"}"#).unwrap();
        assert_eq!(info, UserInfo::human("alice"));
    }

    #[tokio::test]
    async fn test_arc_forwards_lookups() {
        let dir = Arc::new(StubDirectory);
        assert_directory(&dir);
        let info = dir.channel_info("C1").await.unwrap();
        assert_eq!(info.name, "name-of-C1");
        assert!(dir.user_info("U1").await.is_err());
    }
}
