//! Incremental delivery contract for `converse_stream`

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One event of a streamed conversation.
///
/// Serialized as one JSON object per frame, e.g.
/// `{"type":"chunk","content":"Hel"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Always the first event
    Start {
        #[serde(rename = "correlationId")]
        correlation_id: String,
    },
    /// A fragment of assistant text
    Chunk { content: String },
    /// Successful end of stream, carrying the concatenated text
    Done {
        #[serde(rename = "correlationId")]
        correlation_id: String,
        #[serde(rename = "fullText")]
        full_text: String,
    },
    /// Failure after streaming began; terminal
    Error { message: String },
}

impl StreamEvent {
    pub fn start(correlation_id: impl Into<String>) -> Self {
        Self::Start {
            correlation_id: correlation_id.into(),
        }
    }

    pub fn chunk(content: impl Into<String>) -> Self {
        Self::Chunk {
            content: content.into(),
        }
    }

    pub fn done(correlation_id: impl Into<String>, full_text: impl Into<String>) -> Self {
        Self::Done {
            correlation_id: correlation_id.into(),
            full_text: full_text.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// `Done` and `Error` end the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// Finite, single-consumer sequence of [`StreamEvent`]s.
///
/// Dropping the stream closes the channel, which stops the producing task and
/// releases whatever transport it holds.
pub struct EventStream {
    receiver: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    /// Create a channel pair for building an event stream
    pub fn channel(buffer: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (EventSender { sender: tx }, Self { receiver: rx })
    }

    /// Receive the next event, `None` once the producer is finished
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Drain every remaining event
    pub async fn collect_events(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half for building an event stream
#[derive(Clone)]
pub struct EventSender {
    sender: mpsc::Sender<StreamEvent>,
}

impl EventSender {
    /// Send an event. Fails only when the consumer has gone away.
    pub async fn send(&self, event: StreamEvent) -> Result<(), mpsc::error::SendError<StreamEvent>> {
        self.sender.send(event).await
    }

    /// Check if the receiver is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the receiver has been dropped
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}
