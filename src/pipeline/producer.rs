//! Producers: one bounded, transformed sequence per source channel.

use crate::numeric::Numeric;
use crate::pipeline::source::SourceId;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pure transform applied to every index a producer generates.
pub type Transform<N> = fn(N) -> N;

/// What a producer did before its channel closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerReport {
    pub source: SourceId,
    /// Items successfully handed to the channel.
    pub sent: usize,
    /// False when the run was cancelled or the reader went away first.
    pub completed: bool,
}

/// Emits `f(0), f(1), ..., f(n-1)` into its channel, then closes it.
#[derive(Clone)]
pub struct Producer<N> {
    id: SourceId,
    bound: N,
    transform: Transform<N>,
    delay: Option<Duration>,
}

enum Step {
    Sent,
    ReaderGone,
    Cancelled,
}

impl<N: Numeric> Producer<N> {
    pub fn new(id: SourceId, bound: N, transform: Transform<N>) -> Self {
        Self {
            id,
            bound,
            transform,
            delay: None,
        }
    }

    /// Sleep for `delay` before each item.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = (!delay.is_zero()).then_some(delay);
        self
    }

    /// Number of items this producer will emit if left to finish.
    pub fn expected_items(&self) -> usize {
        self.bound.index_count()
    }

    /// Run to completion.
    ///
    /// Takes the sender by value: the channel closes when this returns, and
    /// nothing can be written to it afterwards.
    pub async fn run(self, sender: mpsc::Sender<N>, cancel: CancellationToken) -> ProducerReport {
        debug!("{} producing values for indices below {}", self.id, self.bound);

        let mut sent = 0;

        // Counted in usize: floats stop advancing by one past their exact range.
        for index in 0..self.expected_items() {
            if let Some(delay) = self.delay {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.report(sent, Step::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let value = (self.transform)(N::from_index(index));
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                result = sender.send(value) => match result {
                    Ok(()) => Step::Sent,
                    Err(_) => Step::ReaderGone,
                },
            };

            match step {
                Step::Sent => sent += 1,
                other => return self.report(sent, other),
            }
        }

        self.report(sent, Step::Sent)
    }

    fn report(&self, sent: usize, last: Step) -> ProducerReport {
        let completed = match last {
            Step::Sent => {
                debug!("{} finished after {} items", self.id, sent);
                true
            }
            Step::ReaderGone => {
                debug!("{} stopped after {} items: reader dropped", self.id, sent);
                false
            }
            Step::Cancelled => {
                debug!("{} stopped after {} items: cancelled", self.id, sent);
                false
            }
        };

        ProducerReport {
            source: self.id,
            sent,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{identity, square};
    use crate::pipeline::source::source_channel;
    use futures::StreamExt;

    async fn collect<N: Numeric>(producer: Producer<N>, capacity: usize) -> (Vec<N>, ProducerReport) {
        let (tx, source) = source_channel(capacity);
        let handle = tokio::spawn(producer.run(tx, CancellationToken::new()));
        let items: Vec<N> = source.collect().await;
        (items, handle.await.unwrap())
    }

    #[tokio::test]
    async fn test_emits_transformed_indices_in_order() {
        let producer = Producer::new(SourceId(0), 5i64, square);
        let (items, report) = collect(producer, 5).await;

        assert_eq!(items, vec![0, 1, 4, 9, 16]);
        assert_eq!(report.sent, 5);
        assert!(report.completed);
    }

    #[tokio::test]
    async fn test_small_capacity_applies_backpressure_without_loss() {
        let producer = Producer::new(SourceId(1), 50u32, |x| x);
        let (items, report) = collect(producer, 1).await;

        assert_eq!(items, (0..50).collect::<Vec<u32>>());
        assert_eq!(report.sent, 50);
    }

    #[tokio::test]
    async fn test_non_positive_bound_closes_immediately() {
        let (items, report) = collect(Producer::new(SourceId(0), 0i32, square), 1).await;
        assert!(items.is_empty());
        assert!(report.completed);

        let (items, _) = collect(Producer::new(SourceId(0), -4i32, square), 1).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fractional_float_bound() {
        let producer = Producer::new(SourceId(0), 2.5f64, square);
        assert_eq!(producer.expected_items(), 3);

        let (items, _) = collect(producer, 3).await;
        assert_eq!(items, vec![0.0, 1.0, 4.0]);
    }

    #[tokio::test]
    async fn test_float_bound_past_exact_integer_range_terminates() {
        let bound = 16_777_220f32;
        let producer = Producer::new(SourceId(0), bound, identity);
        let expected = producer.expected_items();

        let (tx, source) = source_channel(4096);
        let handle = tokio::spawn(producer.run(tx, CancellationToken::new()));
        let received = tokio::time::timeout(Duration::from_secs(120), source.count())
            .await
            .expect("producer kept emitting past its bound");

        assert_eq!(received, expected);
        let report = handle.await.unwrap();
        assert_eq!(report.sent, expected);
        assert!(report.completed);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, _source) = source_channel::<i64>(8);
        let report = Producer::new(SourceId(2), 5i64, square).run(tx, cancel).await;

        assert_eq!(report.sent, 0);
        assert!(!report.completed);
    }

    #[tokio::test]
    async fn test_stops_when_reader_dropped() {
        let (tx, source) = source_channel::<i64>(2);
        drop(source);

        let report = Producer::new(SourceId(0), 10i64, square)
            .run(tx, CancellationToken::new())
            .await;

        assert_eq!(report.sent, 0);
        assert!(!report.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_paces_items() {
        let start = tokio::time::Instant::now();
        let producer = Producer::new(SourceId(0), 4i64, square).with_delay(Duration::from_millis(25));
        let (items, _) = collect(producer, 4).await;

        assert_eq!(items.len(), 4);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
