//! Source channels: the bounded conduits between producers and the aggregator.

use futures::Stream;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Zero-based index naming one producer and its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SourceId(pub usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Reading half of a source channel.
///
/// Yields items in send order, then `None` once the producer has dropped its
/// sender. Polling again after `None` is an invariant violation and panics.
pub struct SourceChannel<N> {
    receiver: mpsc::Receiver<N>,
    closed: bool,
}

// No field is structurally pinned.
impl<N> Unpin for SourceChannel<N> {}

impl<N> SourceChannel<N> {
    /// Whether the end of the stream has been observed.
    #[allow(dead_code)] // Inspected by tests
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<N> Stream for SourceChannel<N> {
    type Item = N;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<N>> {
        let this = self.get_mut();
        assert!(!this.closed, "source channel polled after it reported closed");

        match this.receiver.poll_recv(cx) {
            Poll::Ready(None) => {
                this.closed = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Create a bounded source channel.
///
/// # Panics
/// If `capacity` is zero.
pub fn source_channel<N>(capacity: usize) -> (mpsc::Sender<N>, SourceChannel<N>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        sender,
        SourceChannel {
            receiver,
            closed: false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_yields_in_order_then_closes() {
        let (tx, mut source) = source_channel::<i32>(4);
        for x in [3, 1, 2] {
            tx.send(x).await.unwrap();
        }
        drop(tx);

        assert_eq!(source.next().await, Some(3));
        assert_eq!(source.next().await, Some(1));
        assert_eq!(source.next().await, Some(2));
        assert!(!source.is_closed());
        assert_eq!(source.next().await, None);
        assert!(source.is_closed());
    }

    #[tokio::test]
    #[should_panic(expected = "polled after it reported closed")]
    async fn test_poll_after_close_panics() {
        let (tx, mut source) = source_channel::<i32>(1);
        drop(tx);

        assert_eq!(source.next().await, None);
        let _ = source.next().await;
    }

    #[test]
    fn test_source_id_display() {
        assert_eq!(SourceId(3).to_string(), "source#3");
    }
}
