//! Fragment streams produced by provider backends

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::agents::error::UpstreamError;

/// Pacing for simulated streaming (providers without native incremental transport)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPacing {
    /// Characters per fragment
    pub chunk_chars: usize,
    /// Pause between fragments
    pub chunk_delay: Duration,
    /// Artificial latency of the offline echo
    pub echo_delay: Duration,
}

impl Default for StreamPacing {
    fn default() -> Self {
        Self {
            chunk_chars: 20,
            chunk_delay: Duration::from_millis(50),
            echo_delay: Duration::from_millis(200),
        }
    }
}

/// Split `text` into windows of `size` characters. The last window may be shorter.
pub fn split_windows(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|w| w.iter().collect()).collect()
}

/// Streaming text fragments from a provider
pub struct FragmentStream {
    receiver: mpsc::Receiver<Result<String, UpstreamError>>,
}

impl FragmentStream {
    /// Create a channel pair for building a fragment stream
    pub fn channel(buffer: usize) -> (FragmentSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (FragmentSender { sender: tx }, Self { receiver: rx })
    }

    /// Next fragment, `None` at end of stream
    pub async fn next_fragment(&mut self) -> Option<Result<String, UpstreamError>> {
        self.receiver.recv().await
    }

    /// Concatenate every fragment, stopping at the first error
    pub async fn collect_text(mut self) -> Result<String, UpstreamError> {
        let mut text = String::new();
        while let Some(fragment) = self.receiver.recv().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, UpstreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half for building a fragment stream
#[derive(Clone)]
pub struct FragmentSender {
    sender: mpsc::Sender<Result<String, UpstreamError>>,
}

/// Returned when the consumer dropped the stream
#[derive(Debug)]
pub struct ConsumerGone;

impl FragmentSender {
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ConsumerGone> {
        self.sender.send(Ok(text.into())).await.map_err(|_| ConsumerGone)
    }

    pub async fn send_error(&self, error: UpstreamError) -> Result<(), ConsumerGone> {
        self.sender.send(Err(error)).await.map_err(|_| ConsumerGone)
    }

    /// Replay complete text in fixed windows with a pause between them
    pub async fn send_windowed(&self, text: &str, pacing: &StreamPacing) -> Result<(), ConsumerGone> {
        let windows = split_windows(text, pacing.chunk_chars);
        let count = windows.len();
        for (index, window) in windows.into_iter().enumerate() {
            self.send_text(window).await?;
            if index + 1 < count && !pacing.chunk_delay.is_zero() {
                tokio::time::sleep(pacing.chunk_delay).await;
            }
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the consumer has dropped the stream
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}
