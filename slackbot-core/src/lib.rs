// ABOUTME: Platform-agnostic event normalization and identity resolution for chat bots
// ABOUTME: Translates raw transport events, rewrites mentions, and serializes outgoing sends

pub mod bot;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod identity;
pub mod mentions;
pub mod metrics;
pub mod testing;
pub mod traits;
pub mod translator;

pub use bot::{BotEventStream, BotHandle, SlackBot};
pub use dispatcher::{OutgoingDispatcher, OutgoingSender};
pub use error::{BotError, Result};
pub use events::{BotEvent, MessageEvent, OutgoingMessage, RawEvent, RawMessage};
pub use identity::{IdentityCache, ResolvedUser};
pub use mentions::{parse_references, rewrite_mentions, MentionKind, MentionRef};
pub use translator::{EventTranslator, TranslatorState};

// Re-export collaborator traits for transport implementations
pub use traits::{
    ChannelDirectory, ChannelInfo, Directory, EventSource, MessageSink, RawEventStream, Transport,
    UserDirectory, UserInfo,
};
