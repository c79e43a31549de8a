// ABOUTME: Outgoing dispatcher serializing host sends onto the single transport write path
// ABOUTME: One write in flight at a time; failed writes are logged and the queue keeps draining

use metrics::counter;
use tokio::sync::mpsc;

use crate::error::BotError;
use crate::events::OutgoingMessage;
use crate::metrics::{MESSAGES_SENT_TOTAL, MESSAGES_SEND_FAILURES_TOTAL};
use crate::traits::MessageSink;

/// Intake handle for outgoing messages. Cheap to clone; the dispatcher loop
/// ends once every clone has been dropped.
#[derive(Debug, Clone)]
pub struct OutgoingSender {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

impl OutgoingSender {
    /// Queue a message for posting as `from` in `channel`.
    pub fn send(
        &self,
        from: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), BotError> {
        self.enqueue(OutgoingMessage::new(from, channel, text))
    }

    pub fn enqueue(&self, message: OutgoingMessage) -> Result<(), BotError> {
        self.tx
            .send(message)
            .map_err(|_| BotError::DispatcherClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single consumer of the outgoing intake queue.
pub struct OutgoingDispatcher<S> {
    sink: S,
    rx: mpsc::UnboundedReceiver<OutgoingMessage>,
}

impl<S: MessageSink> OutgoingDispatcher<S> {
    pub fn new(sink: S) -> (Self, OutgoingSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sink, rx }, OutgoingSender { tx })
    }

    /// Post queued messages one at a time, in submission order. Each write is
    /// awaited before the next message is taken off the queue.
    pub async fn run(mut self) {
        tracing::debug!("Outgoing dispatcher started");

        while let Some(message) = self.rx.recv().await {
            match self.sink.send(&message).await {
                Ok(()) => {
                    counter!(MESSAGES_SENT_TOTAL).increment(1);
                    tracing::debug!(channel = %message.channel, from = %message.from, "Message sent");
                }
                Err(e) => {
                    counter!(MESSAGES_SEND_FAILURES_TOTAL).increment(1);
                    let err = BotError::send_failed(&message.channel, e);
                    tracing::error!(error = %err, "Failed to send outgoing message");
                }
            }
        }

        tracing::debug!("Outgoing dispatcher stopped, all senders dropped");
    }
}
