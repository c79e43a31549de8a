// ABOUTME: Transport implementations for the bot pipeline
// ABOUTME: Re-exports the Slack Socket Mode transport and the scripted replay transport

pub mod replay;
#[cfg(feature = "slack")]
pub mod slack;

pub use replay::{ReplayScript, ReplayTransport};
#[cfg(feature = "slack")]
pub use slack::SlackTransport;
