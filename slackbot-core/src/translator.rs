// ABOUTME: Event translator turning raw transport events into normalized BotEvents
// ABOUTME: Resolves sender and channel names, rewrites mentions, and reports failures as events

use metrics::counter;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::error::BotError;
use crate::events::{BotEvent, MessageEvent, RawEvent, RawMessage};
use crate::identity::IdentityCache;
use crate::mentions::rewrite_mentions;
use crate::metrics::EVENTS_EMITTED_TOTAL;
use crate::traits::{Directory, RawEventStream};

/// Translator lifecycle. Purely informational; no behavior depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorState {
    WaitingForFirstEvent,
    Running,
}

/// Consumes raw events one at a time and produces normalized events in the
/// same order. Owns the session's identity cache.
pub struct EventTranslator<D> {
    cache: IdentityCache<D>,
    state: TranslatorState,
    self_user_id: Option<String>,
}

impl<D: Directory> EventTranslator<D> {
    pub fn new(cache: IdentityCache<D>) -> Self {
        Self {
            cache,
            state: TranslatorState::WaitingForFirstEvent,
            self_user_id: None,
        }
    }

    /// Drop messages sent by this user id (the bot's own posts echoed back).
    pub fn with_self_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.self_user_id = Some(user_id.into());
        self
    }

    pub fn state(&self) -> TranslatorState {
        self.state
    }

    pub fn cache(&self) -> &IdentityCache<D> {
        &self.cache
    }

    /// Translate a single raw event. `None` means the event is not modeled
    /// and produces nothing.
    pub async fn translate(&mut self, raw: RawEvent) -> Option<BotEvent> {
        self.state = TranslatorState::Running;

        match raw {
            RawEvent::Hello => {
                tracing::info!("Connected to server");
                Some(BotEvent::Connected)
            }
            RawEvent::Message(msg) => {
                if self.is_own_message(&msg) {
                    tracing::trace!(channel_id = %msg.channel, "Skipping own message");
                    return None;
                }
                match self.translate_message(msg).await {
                    Ok(event) => Some(BotEvent::Message(event)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to translate message event");
                        Some(BotEvent::Error(e))
                    }
                }
            }
            RawEvent::Other { kind } => {
                tracing::trace!(kind = %kind, "Ignoring unmodeled event");
                None
            }
        }
    }

    async fn translate_message(&mut self, msg: RawMessage) -> Result<MessageEvent, BotError> {
        let (sender, is_bot) = match (msg.username, msg.user) {
            (Some(username), _) if !username.is_empty() => (username, false),
            (_, Some(user_id)) => {
                let user = self.cache.resolve_user(&user_id).await?;
                (user.name, user.is_bot)
            }
            _ => {
                return Err(BotError::MissingSender {
                    channel_id: msg.channel,
                })
            }
        };

        let channel = self.cache.resolve_channel(&msg.channel).await?;
        let text = rewrite_mentions(&msg.text, &mut self.cache).await;

        Ok(MessageEvent {
            sender,
            channel,
            text,
            is_bot,
        })
    }

    fn is_own_message(&self, msg: &RawMessage) -> bool {
        match (&self.self_user_id, &msg.user) {
            (Some(own), Some(user)) => own == user,
            _ => false,
        }
    }

    /// Drain `events` into `tx` until the transport stream ends or the
    /// receiving side is dropped.
    pub async fn run(mut self, mut events: RawEventStream, tx: mpsc::UnboundedSender<BotEvent>) {
        tracing::info!("Starting event loop");

        while let Some(raw) = events.next().await {
            let Some(event) = self.translate(raw).await else {
                continue;
            };

            counter!(EVENTS_EMITTED_TOTAL, "type" => event.event_type()).increment(1);
            if tx.send(event).is_err() {
                tracing::info!("Event receiver dropped, stopping event loop");
                return;
            }
        }

        tracing::info!("Transport event stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDirectory;

    fn translator(dir: MockDirectory) -> EventTranslator<MockDirectory> {
        EventTranslator::new(IdentityCache::new(dir))
    }

    fn directory() -> MockDirectory {
        MockDirectory::new()
            .with_channel("C1", "general")
            .with_user("U1", "alice")
            .with_user("U2", "bob")
            .with_bot("B1", "deploybot")
    }

    #[tokio::test]
    async fn test_hello_yields_connected_without_lookups() {
        let mut t = translator(directory());
        assert_eq!(t.state(), TranslatorState::WaitingForFirstEvent);

        let event = t.translate(RawEvent::Hello).await;
        assert!(matches!(event, Some(BotEvent::Connected)));
        assert_eq!(t.state(), TranslatorState::Running);
        assert_eq!(t.cache().directory().total_calls(), 0);
        assert_eq!(t.cache().channel_count(), 0);
        assert_eq!(t.cache().user_count(), 0);
    }

    #[tokio::test]
    async fn test_message_is_resolved_and_rewritten() {
        let mut t = translator(directory());
        let raw = RawEvent::Message(RawMessage::from_user("U1", "C1", "hey <U2>, see <C1>"));

        let event = t.translate(raw).await.unwrap();
        let msg = event.as_message().unwrap();
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.channel, "general");
        assert_eq!(msg.text, "hey @bob, see #general");
        assert!(!msg.is_bot);
    }

    #[tokio::test]
    async fn test_username_override_skips_user_lookup() {
        let mut t = translator(directory());
        let raw = RawEvent::Message(RawMessage::from_username("github", "C1", "build passed"));

        let event = t.translate(raw).await.unwrap();
        let msg = event.as_message().unwrap();
        assert_eq!(msg.sender, "github");
        assert!(!msg.is_bot);
        assert_eq!(t.cache().directory().user_calls("github"), 0);
    }

    #[tokio::test]
    async fn test_bot_sender_has_empty_name() {
        let mut t = translator(directory());
        let raw = RawEvent::Message(RawMessage::from_user("B1", "C1", "deployed"));

        let event = t.translate(raw).await.unwrap();
        let msg = event.as_message().unwrap();
        assert!(msg.is_bot);
        assert!(msg.sender.is_empty());
        assert_eq!(msg.channel, "general");
    }

    #[tokio::test]
    async fn test_sender_lookup_failure_yields_only_error() {
        let mut t = translator(directory());
        let raw = RawEvent::Message(RawMessage::from_user("U404", "C1", "hello"));

        let event = t.translate(raw).await.unwrap();
        assert!(matches!(event, BotEvent::Error(BotError::UserLookupFailed { .. })));
        // Channel is never looked up once the sender failed
        assert_eq!(t.cache().directory().channel_calls("C1"), 0);
    }

    #[tokio::test]
    async fn test_channel_lookup_failure_yields_only_error() {
        let mut t = translator(directory());
        let raw = RawEvent::Message(RawMessage::from_user("U1", "C404", "hello"));

        let event = t.translate(raw).await.unwrap();
        assert!(matches!(
            event,
            BotEvent::Error(BotError::ChannelLookupFailed { ref channel_id, .. }) if channel_id == "C404"
        ));
    }

    #[tokio::test]
    async fn test_message_without_sender_is_an_error() {
        let mut t = translator(directory());
        let raw = RawEvent::Message(RawMessage {
            user: None,
            username: Some(String::new()),
            channel: "C1".to_string(),
            text: "orphan".to_string(),
        });

        let event = t.translate(raw).await.unwrap();
        assert!(matches!(event, BotEvent::Error(BotError::MissingSender { .. })));
    }

    #[tokio::test]
    async fn test_unmodeled_event_is_ignored() {
        let mut t = translator(directory());
        let event = t
            .translate(RawEvent::Other {
                kind: "user_typing".to_string(),
            })
            .await;
        assert!(event.is_none());
        assert_eq!(t.cache().directory().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_own_messages_are_skipped() {
        let mut t = translator(directory()).with_self_user_id("U1");
        let own = RawEvent::Message(RawMessage::from_user("U1", "C1", "echo"));
        assert!(t.translate(own).await.is_none());

        let other = RawEvent::Message(RawMessage::from_user("U2", "C1", "hi"));
        assert!(t.translate(other).await.is_some());
    }

    #[tokio::test]
    async fn test_run_preserves_order_and_survives_errors() {
        let t = translator(directory());
        let raw = vec![
            RawEvent::Hello,
            RawEvent::Message(RawMessage::from_user("U404", "C1", "lost")),
            RawEvent::Other {
                kind: "presence_change".to_string(),
            },
            RawEvent::Message(RawMessage::from_user("U1", "C1", "first")),
            RawEvent::Message(RawMessage::from_user("U2", "C1", "second")),
        ];
        let stream: RawEventStream = Box::pin(tokio_stream::iter(raw));
        let (tx, mut rx) = mpsc::unbounded_channel();

        t.run(stream, tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["connected", "error", "message", "message"]);
        assert_eq!(events[2].as_message().unwrap().text, "first");
        assert_eq!(events[3].as_message().unwrap().text, "second");
    }

    #[tokio::test]
    async fn test_run_stops_when_receiver_dropped() {
        let t = translator(directory());
        let stream: RawEventStream = Box::pin(tokio_stream::iter(vec![
            RawEvent::Hello,
            RawEvent::Hello,
        ]));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        // Returns instead of looping forever
        t.run(stream, tx).await;
    }
}
