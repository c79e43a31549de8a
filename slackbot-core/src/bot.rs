// ABOUTME: Bot session wiring a transport to the translator and outgoing dispatcher
// ABOUTME: Owns one identity cache per session and hands the host an event stream plus a sender

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::dispatcher::{OutgoingDispatcher, OutgoingSender};
use crate::error::BotError;
use crate::events::BotEvent;
use crate::identity::IdentityCache;
use crate::traits::Transport;
use crate::translator::EventTranslator;

/// Host-facing stream of normalized events.
pub type BotEventStream = UnboundedReceiverStream<BotEvent>;

/// A bot session over one transport.
pub struct SlackBot<T> {
    transport: Arc<T>,
    self_user_id: Option<String>,
}

impl<T: Transport + 'static> SlackBot<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            self_user_id: None,
        }
    }

    /// Skip inbound messages authored by this user id.
    pub fn with_self_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.self_user_id = Some(user_id.into());
        self
    }

    /// Connect the transport and spawn the translator and dispatcher loops.
    pub async fn start(self) -> Result<BotHandle, BotError> {
        let events = self
            .transport
            .connect()
            .await
            .map_err(|e| BotError::Connect { source: e.into() })?;

        tracing::info!(
            transport = self.transport.transport_id(),
            "Transport connected, starting bot session"
        );

        let cache = IdentityCache::new(Arc::clone(&self.transport));
        let mut translator = EventTranslator::new(cache);
        if let Some(user_id) = self.self_user_id {
            translator = translator.with_self_user_id(user_id);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let translator_task = tokio::spawn(translator.run(events, event_tx));

        let (dispatcher, outgoing) = OutgoingDispatcher::new(Arc::clone(&self.transport));
        let dispatcher_task = tokio::spawn(dispatcher.run());

        Ok(BotHandle {
            events: event_rx,
            outgoing,
            translator_task,
            dispatcher_task,
        })
    }
}

/// Running session: normalized events in, outgoing messages out.
pub struct BotHandle {
    events: mpsc::UnboundedReceiver<BotEvent>,
    outgoing: OutgoingSender,
    translator_task: JoinHandle<()>,
    dispatcher_task: JoinHandle<()>,
}

impl BotHandle {
    /// Next normalized event, or `None` once the transport stream has ended.
    pub async fn next_event(&mut self) -> Option<BotEvent> {
        self.events.recv().await
    }

    /// Queue a plain-text message posted as `from` in `channel`.
    pub fn send_message(
        &self,
        from: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), BotError> {
        self.outgoing.send(from, channel, text)
    }

    /// Another intake handle for the outgoing queue.
    pub fn sender(&self) -> OutgoingSender {
        self.outgoing.clone()
    }

    /// Split into an event stream and an intake handle. The background loops
    /// keep running until the transport stream ends and every sender is gone.
    pub fn into_parts(self) -> (BotEventStream, OutgoingSender) {
        (UnboundedReceiverStream::new(self.events), self.outgoing)
    }

    /// Stop translating and wait for already queued messages to be written.
    ///
    /// Senders obtained through [`BotHandle::sender`] keep the dispatcher
    /// alive and must be dropped first.
    pub async fn shutdown(self) {
        self.translator_task.abort();
        drop(self.events);
        drop(self.outgoing);
        if let Err(e) = self.dispatcher_task.await {
            tracing::warn!(error = %e, "Outgoing dispatcher task ended abnormally");
        }
        tracing::info!("Bot session shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parts_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<BotHandle>();
        assert_send::<BotEventStream>();
        assert_send::<OutgoingSender>();
    }
}
