// ABOUTME: Typed errors for identity resolution, translation and outgoing dispatch
// ABOUTME: Collaborator failures arrive as anyhow errors and are boxed as the source

use std::error::Error as StdError;

/// Boxed cause carried by collaborator-backed errors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, BotError>;

/// Errors produced by the bot pipeline.
///
/// Translation errors are surfaced to the host as [`crate::BotEvent::Error`]
/// rather than terminating the event stream.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Channel-info lookup failed; the cache was left untouched.
    #[error("could not fetch channel name for {channel_id}: {source}")]
    ChannelLookupFailed {
        channel_id: String,
        #[source]
        source: BoxError,
    },

    /// User-info lookup failed; the cache was left untouched.
    #[error("could not get username for {user_id}: {source}")]
    UserLookupFailed {
        user_id: String,
        #[source]
        source: BoxError,
    },

    /// A mention reference could not be resolved. Never leaves the rewriter.
    #[error("could not resolve mention {reference}: {source}")]
    MentionResolutionFailed {
        reference: String,
        #[source]
        source: BoxError,
    },

    /// A message event carried neither a sender id nor a display name.
    #[error("message in {channel_id} has no sender")]
    MissingSender { channel_id: String },

    /// The transport rejected an outgoing message.
    #[error("failed to send message to {channel}: {source}")]
    SendFailed {
        channel: String,
        #[source]
        source: BoxError,
    },

    /// The outgoing dispatcher loop is no longer running.
    #[error("outgoing dispatcher is closed")]
    DispatcherClosed,

    /// The transport could not open its event stream.
    #[error("failed to connect transport: {source}")]
    Connect {
        #[source]
        source: BoxError,
    },
}

impl BotError {
    pub fn channel_lookup(channel_id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ChannelLookupFailed {
            channel_id: channel_id.into(),
            source: source.into(),
        }
    }

    pub fn user_lookup(user_id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::UserLookupFailed {
            user_id: user_id.into(),
            source: source.into(),
        }
    }

    pub fn send_failed(channel: impl Into<String>, source: anyhow::Error) -> Self {
        Self::SendFailed {
            channel: channel.into(),
            source: source.into(),
        }
    }

    /// Wrap a lookup failure that happened while rewriting a mention.
    pub fn mention(reference: impl Into<String>, cause: BotError) -> Self {
        Self::MentionResolutionFailed {
            reference: reference.into(),
            source: Box::new(cause),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelLookupFailed { .. } => "channel_lookup_failed",
            Self::UserLookupFailed { .. } => "user_lookup_failed",
            Self::MentionResolutionFailed { .. } => "mention_resolution_failed",
            Self::MissingSender { .. } => "missing_sender",
            Self::SendFailed { .. } => "send_failed",
            Self::DispatcherClosed => "dispatcher_closed",
            Self::Connect { .. } => "connect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_channel_lookup_keeps_cause() {
        let err = BotError::channel_lookup("C123", anyhow::anyhow!("channel_not_found"));
        assert_eq!(err.kind(), "channel_lookup_failed");
        assert!(err.to_string().contains("C123"));
        assert!(err.to_string().contains("channel_not_found"));
        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "channel_not_found");
    }

    #[test]
    fn test_user_lookup_message() {
        let err = BotError::user_lookup("U42", anyhow::anyhow!("user_not_found"));
        assert_eq!(err.kind(), "user_lookup_failed");
        assert_eq!(
            err.to_string(),
            "could not get username for U42: user_not_found"
        );
    }

    #[test]
    fn test_mention_wraps_lookup_error() {
        let inner = BotError::user_lookup("U42", anyhow::anyhow!("boom"));
        let err = BotError::mention("<U42>", inner);
        assert_eq!(err.kind(), "mention_resolution_failed");
        let source = err.source().unwrap();
        assert!(source.to_string().contains("U42"));
    }

    #[test]
    fn test_dispatcher_closed_has_no_source() {
        let err = BotError::DispatcherClosed;
        assert!(err.source().is_none());
        assert_eq!(err.kind(), "dispatcher_closed");
    }
}
