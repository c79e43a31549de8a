// ABOUTME: Root library module exposing configuration, paths, and transports
// ABOUTME: The platform-agnostic pipeline lives in slackbot-core and is re-exported here

pub mod config;
pub mod paths;
pub mod platform;

// Re-export the pipeline from slackbot-core
pub use slackbot_core::{
    BotError, BotEvent, BotHandle, MessageEvent, OutgoingMessage, OutgoingSender, RawEvent,
    RawMessage, SlackBot,
};
