// ABOUTME: Raw transport events, normalized bot events, and the outgoing message record
// ABOUTME: Raw events are transport-shaped; BotEvent is what the host application consumes

use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// An event as delivered by a transport, before any identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    /// The transport finished its handshake.
    Hello,
    /// A chat message.
    Message(RawMessage),
    /// Any event kind the pipeline does not model.
    Other { kind: String },
}

/// A message as the transport saw it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Sender's user id. May be absent when `username` is provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Display name set by bots or integrations posting under an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Channel id the message was posted in.
    pub channel: String,
    /// Message text with inline `<...>` references intact.
    #[serde(default)]
    pub text: String,
}

impl RawMessage {
    /// Message from a user id that still needs resolving.
    pub fn from_user(
        user: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user: Some(user.into()),
            username: None,
            channel: channel.into(),
            text: text.into(),
        }
    }

    /// Message posted under an explicit display name.
    pub fn from_username(
        username: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user: None,
            username: Some(username.into()),
            channel: channel.into(),
            text: text.into(),
        }
    }
}

/// A fully resolved, mention-rewritten message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub sender: String,
    pub channel: String,
    pub text: String,
    pub is_bot: bool,
}

/// Normalized events exposed to the host application.
#[derive(Debug)]
pub enum BotEvent {
    /// Transport handshake completed.
    Connected,
    /// A chat message with sender and channel resolved to names.
    Message(MessageEvent),
    /// Translating one raw event failed. The stream keeps going.
    Error(BotError),
}

impl BotEvent {
    /// Event type name, used in logs and metrics labels.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
        }
    }

    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Self::Message(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A message the host wants posted. Consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Display name to post as.
    pub from: String,
    pub channel: String,
    pub text: String,
}

impl OutgoingMessage {
    pub fn new(from: impl Into<String>, channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            channel: channel.into(),
            text: text.into(),
        }
    }
}
