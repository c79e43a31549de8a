// ABOUTME: Slack transport over Socket Mode implementing the pipeline's Transport contract
// ABOUTME: Streams push events as raw events, resolves ids via the Web API, posts with chat.postMessage

use anyhow::{Context, Result};
use async_trait::async_trait;
use slack_morphism::prelude::*;
use slackbot_core::{
    ChannelDirectory, ChannelInfo, EventSource, MessageSink, OutgoingMessage, RawEvent,
    RawEventStream, RawMessage, Transport, UserDirectory, UserInfo,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::SlackConfig;

// =============================================================================
// Shared state passed to Socket Mode callbacks via SlackClientEventsUserState
// =============================================================================

/// State shared with Socket Mode callback functions via user state storage.
/// Callbacks are fn pointers (not closures), so they cannot capture variables.
#[derive(Clone)]
struct SlackBridgeState {
    /// Raw event channel feeding the translator
    tx: mpsc::UnboundedSender<RawEvent>,
}

// =============================================================================
// Socket Mode callback functions (must be fn pointers, not closures)
// =============================================================================

/// Forward every push event to the raw event stream
async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bridge = {
        let guard = states.read().await;
        guard
            .get_user_state::<SlackBridgeState>()
            .cloned()
            .ok_or("SlackBridgeState not found in user state")?
    };

    let raw = match event.event {
        SlackEventCallbackBody::Message(msg_event) => message_event_to_raw(&msg_event),
        other => RawEvent::Other {
            kind: event_kind(&other),
        },
    };

    if bridge.tx.send(raw).is_err() {
        tracing::warn!(platform = "slack", "Raw event receiver dropped");
    }
    Ok(())
}

/// Socket Mode error handler
fn socket_mode_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::error!(platform = "slack", error = %err, "Socket Mode error");
    HttpStatusCode::OK
}

/// Convert a Slack message event into the transport-neutral raw shape
fn message_event_to_raw(msg_event: &SlackMessageEvent) -> RawEvent {
    let raw = raw_message(
        msg_event.sender.user.as_ref().map(|u| u.to_string()),
        msg_event.sender.username.clone(),
        msg_event.origin.channel.as_ref().map(|c| c.to_string()),
        msg_event
            .content
            .as_ref()
            .and_then(|c| c.text.as_ref())
            .map(|t| t.to_string()),
    );

    match raw {
        Some(raw) => RawEvent::Message(raw),
        // Without a channel there is nothing to resolve against
        None => RawEvent::Other {
            kind: "message".to_string(),
        },
    }
}

fn raw_message(
    user: Option<String>,
    username: Option<String>,
    channel: Option<String>,
    text: Option<String>,
) -> Option<RawMessage> {
    Some(RawMessage {
        user: user.filter(|u| !u.is_empty()),
        username: username.filter(|u| !u.is_empty()),
        channel: channel.filter(|c| !c.is_empty())?,
        text: text.unwrap_or_default(),
    })
}

/// Best-effort event type name for unmodeled push events
fn event_kind(body: &SlackEventCallbackBody) -> String {
    serde_json::to_value(body)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

// =============================================================================
// SlackTransport
// =============================================================================

/// Slack transport using slack-morphism with Socket Mode
pub struct SlackTransport {
    /// Shared Slack client for API calls
    client: Arc<SlackHyperClient>,
    /// Bot OAuth token (xoxb-...) for Web API calls
    bot_token: SlackApiToken,
    /// App-level token (xapp-...) for Socket Mode connections
    app_token: SlackApiToken,
    /// Bot's Slack user ID (resolved via auth.test at startup)
    bot_user_id: String,
}

impl SlackTransport {
    /// Create a new SlackTransport from config.
    ///
    /// Resolves the bot's user ID via the `auth.test` API call.
    pub async fn new(config: &SlackConfig) -> Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("Failed to create Slack HTTP connector")?,
        ));

        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.bot_token.clone()));
        let app_token = SlackApiToken::new(SlackApiTokenValue(config.app_token.clone()));

        let session = client.open_session(&bot_token);
        let auth_response = session
            .auth_test()
            .await
            .context("Failed to call Slack auth.test, check bot_token")?;

        let bot_user_id = auth_response.user_id.to_string();

        tracing::info!(
            bot_user = %bot_user_id,
            team = %auth_response.team,
            "Slack bot authenticated"
        );

        Ok(Self {
            client,
            bot_token,
            app_token,
            bot_user_id,
        })
    }

    /// Bot's own user id on this workspace
    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }
}

/// Turn the outcome of `listen_for` into the connect result. On success the
/// stream opens with `Hello`; on failure nothing is queued.
fn socket_mode_started<E>(
    listen_result: std::result::Result<(), E>,
    tx: &mpsc::UnboundedSender<RawEvent>,
) -> Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    listen_result.context("Failed to start Socket Mode listener")?;

    tracing::info!(platform = "slack", "Socket Mode connected");
    if tx.send(RawEvent::Hello).is_err() {
        tracing::warn!(platform = "slack", "Raw event receiver dropped before Hello");
    }
    Ok(())
}

#[async_trait]
impl EventSource for SlackTransport {
    async fn connect(&self) -> Result<RawEventStream> {
        let (tx, rx) = mpsc::unbounded_channel();

        let socket_mode_callbacks =
            SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(&self.client))
                .with_error_handler(socket_mode_error_handler)
                .with_user_state(SlackBridgeState { tx: tx.clone() }),
        );

        let socket_mode_listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment,
            socket_mode_callbacks,
        );

        let listen_result = socket_mode_listener.listen_for(&self.app_token).await;
        socket_mode_started(listen_result, &tx)?;
        // The listener's user state keeps the stream open from here on
        drop(tx);

        tokio::spawn(async move {
            // serve() blocks until the listener is shut down
            socket_mode_listener.serve().await;
            tracing::info!(platform = "slack", "Socket Mode listener stopped");
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

#[async_trait]
impl ChannelDirectory for SlackTransport {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        let session = self.client.open_session(&self.bot_token);

        let req = SlackApiConversationsInfoRequest::new(channel_id.into());
        let resp = session
            .conversations_info(&req)
            .await
            .context("Failed to call Slack conversations.info")?;

        let name = resp
            .channel
            .name
            .with_context(|| format!("Slack channel {} has no name", channel_id))?;
        Ok(ChannelInfo::new(name))
    }
}

#[async_trait]
impl UserDirectory for SlackTransport {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        let session = self.client.open_session(&self.bot_token);

        let req = SlackApiUsersInfoRequest::new(user_id.into());
        let resp = session
            .users_info(&req)
            .await
            .context("Failed to call Slack users.info")?;

        let user = resp.user;
        Ok(UserInfo {
            name: user.name.unwrap_or_default(),
            is_bot: user.flags.is_bot.unwrap_or(false),
        })
    }
}

#[async_trait]
impl MessageSink for SlackTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let session = self.client.open_session(&self.bot_token);

        let req = SlackApiChatPostMessageRequest::new(
            message.channel.as_str().into(),
            SlackMessageContent::new().with_text(message.text.clone()),
        )
        .with_username(message.from.clone());

        session
            .chat_post_message(&req)
            .await
            .context("Failed to send Slack message")?;

        Ok(())
    }
}

impl Transport for SlackTransport {
    fn transport_id(&self) -> &'static str {
        "slack"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slack_transport_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SlackTransport>();
    }

    #[test]
    fn test_raw_message_from_user() {
        let raw = raw_message(
            Some("U1".to_string()),
            None,
            Some("C1".to_string()),
            Some("hi <U2>".to_string()),
        )
        .unwrap();
        assert_eq!(raw, RawMessage::from_user("U1", "C1", "hi <U2>"));
    }

    #[test]
    fn test_raw_message_keeps_username_override() {
        let raw = raw_message(
            None,
            Some("github".to_string()),
            Some("C1".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(raw.username.as_deref(), Some("github"));
        assert!(raw.user.is_none());
        assert!(raw.text.is_empty());
    }

    #[test]
    fn test_raw_message_empty_strings_count_as_absent() {
        let raw = raw_message(
            Some(String::new()),
            Some(String::new()),
            Some("C1".to_string()),
            Some("x".to_string()),
        )
        .unwrap();
        assert!(raw.user.is_none());
        assert!(raw.username.is_none());
    }

    #[test]
    fn test_raw_message_requires_channel() {
        assert!(raw_message(Some("U1".to_string()), None, None, None).is_none());
        assert!(raw_message(Some("U1".to_string()), None, Some(String::new()), None).is_none());
    }

    #[test]
    fn test_socket_mode_failure_is_reported_and_sends_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let failure: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "invalid_auth",
        ));

        let err = socket_mode_started(failure, &tx).unwrap_err();

        assert!(err.to_string().contains("Failed to start Socket Mode listener"));
        assert!(format!("{:#}", err).contains("invalid_auth"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_socket_mode_success_queues_hello() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        socket_mode_started(Ok::<(), std::io::Error>(()), &tx).unwrap();
        assert_eq!(rx.try_recv().unwrap(), RawEvent::Hello);
    }

    #[test]
    fn test_socket_mode_success_with_dropped_receiver_is_ok() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        assert!(socket_mode_started(Ok::<(), std::io::Error>(()), &tx).is_ok());
    }

    #[test]
    fn test_bridge_state_clone() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = SlackBridgeState { tx };
        let cloned = state.clone();
        cloned.tx.send(RawEvent::Hello).unwrap();
        assert_eq!(rx.try_recv().unwrap(), RawEvent::Hello);
    }
}
