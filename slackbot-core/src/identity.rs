// ABOUTME: Identity cache mapping channel and user ids to display names
// ABOUTME: Populated on first successful lookup, never evicted; bot accounts are never cached

use metrics::counter;
use std::collections::HashMap;

use crate::error::{BotError, Result};
use crate::metrics::{
    IDENTITY_CACHE_HITS_TOTAL, IDENTITY_CACHE_MISSES_TOTAL, IDENTITY_LOOKUP_FAILURES_TOTAL,
};
use crate::traits::Directory;

/// Outcome of resolving a user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    /// Display name. Empty when `is_bot` is set.
    pub name: String,
    pub is_bot: bool,
}

impl ResolvedUser {
    fn bot() -> Self {
        Self {
            name: String::new(),
            is_bot: true,
        }
    }
}

/// Memoizes channel and user names for one bot session.
///
/// The cache is owned by the translator task and only ever accessed through
/// `&mut self`, so it needs no locking. Sharing it across tasks would require
/// wrapping it in a mutex, since two concurrent first lookups for the same id
/// would race on the populate step.
pub struct IdentityCache<D> {
    directory: D,
    channels: HashMap<String, String>,
    users: HashMap<String, String>,
}

impl<D: Directory> IdentityCache<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            channels: HashMap::new(),
            users: HashMap::new(),
        }
    }

    /// Resolve a channel id to its name, looking it up on a miss.
    pub async fn resolve_channel(&mut self, channel_id: &str) -> Result<String> {
        if let Some(name) = self.channels.get(channel_id) {
            counter!(IDENTITY_CACHE_HITS_TOTAL, "scope" => "channel").increment(1);
            return Ok(name.clone());
        }
        counter!(IDENTITY_CACHE_MISSES_TOTAL, "scope" => "channel").increment(1);

        let info = match self.directory.channel_info(channel_id).await {
            Ok(info) => info,
            Err(e) => {
                counter!(IDENTITY_LOOKUP_FAILURES_TOTAL, "scope" => "channel").increment(1);
                tracing::warn!(channel_id = %channel_id, error = %e, "Could not fetch channel info");
                return Err(BotError::channel_lookup(channel_id, e));
            }
        };

        tracing::debug!(channel_id = %channel_id, name = %info.name, "Cached channel name");
        self.channels
            .insert(channel_id.to_string(), info.name.clone());
        Ok(info.name)
    }

    /// Resolve a user id to its name, looking it up on a miss.
    ///
    /// Bot accounts are reported with `is_bot = true` and an empty name and are
    /// never cached, so every message from a bot triggers a fresh lookup.
    pub async fn resolve_user(&mut self, user_id: &str) -> Result<ResolvedUser> {
        if let Some(name) = self.users.get(user_id) {
            counter!(IDENTITY_CACHE_HITS_TOTAL, "scope" => "user").increment(1);
            return Ok(ResolvedUser {
                name: name.clone(),
                is_bot: false,
            });
        }
        counter!(IDENTITY_CACHE_MISSES_TOTAL, "scope" => "user").increment(1);

        let info = match self.directory.user_info(user_id).await {
            Ok(info) => info,
            Err(e) => {
                counter!(IDENTITY_LOOKUP_FAILURES_TOTAL, "scope" => "user").increment(1);
                tracing::warn!(user_id = %user_id, error = %e, "Could not fetch user info");
                return Err(BotError::user_lookup(user_id, e));
            }
        };

        if info.is_bot {
            tracing::debug!(user_id = %user_id, "User is a bot, not caching");
            return Ok(ResolvedUser::bot());
        }

        tracing::debug!(user_id = %user_id, name = %info.name, "Cached user name");
        self.users.insert(user_id.to_string(), info.name.clone());
        Ok(ResolvedUser {
            name: info.name,
            is_bot: false,
        })
    }

    pub fn cached_channel(&self, channel_id: &str) -> Option<&str> {
        self.channels.get(channel_id).map(String::as_str)
    }

    pub fn cached_user(&self, user_id: &str) -> Option<&str> {
        self.users.get(user_id).map(String::as_str)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }
}
