//! Result rendering and the completion signal.

use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Renders each value the sink receives.
pub trait Emit<N>: Send + 'static {
    fn emit(&mut self, value: N);
}

/// Prints one value per line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutEmitter;

impl<N: Display> Emit<N> for StdoutEmitter {
    fn emit(&mut self, value: N) {
        println!("{}", value);
    }
}

/// Collects values in receipt order.
impl<N: Send + 'static> Emit<N> for Vec<N> {
    fn emit(&mut self, value: N) {
        self.push(value);
    }
}

/// What the sink rendered, plus the emitter handed back.
#[derive(Debug)]
pub struct SinkReport<E> {
    pub emitted: usize,
    pub emitter: E,
}

pub struct Sink<E> {
    emitter: E,
}

impl<E> Sink<E> {
    pub fn new(emitter: E) -> Self {
        Self { emitter }
    }

    /// Render everything on `results` until it closes, then fire `done`.
    ///
    /// When cancelled the signal is not sent; `done` is dropped instead.
    pub async fn run<N>(
        mut self,
        mut results: mpsc::Receiver<N>,
        done: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) -> SinkReport<E>
    where
        E: Emit<N>,
    {
        let mut emitted = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Sink cancelled after rendering {} values", emitted);
                    return SinkReport { emitted, emitter: self.emitter };
                }
                next = results.recv() => next,
            };

            match next {
                Some(value) => {
                    self.emitter.emit(value);
                    emitted += 1;
                }
                None => break,
            }
        }

        debug!("Result channel closed after {} values", emitted);
        if done.send(()).is_err() {
            warn!("Coordinator stopped listening before completion");
        }

        SinkReport {
            emitted,
            emitter: self.emitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_with(values: Vec<i64>) -> (SinkReport<Vec<i64>>, bool) {
        let (tx, rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();

        let sink = tokio::spawn(Sink::new(Vec::new()).run(rx, done_tx, CancellationToken::new()));
        for v in values {
            tx.send(v).await.unwrap();
        }
        drop(tx);

        let fired = done_rx.await.is_ok();
        (sink.await.unwrap(), fired)
    }

    #[tokio::test]
    async fn test_renders_single_value_then_signals() {
        let (report, fired) = run_with(vec![1770]).await;
        assert!(fired);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.emitter, vec![1770]);
    }

    #[tokio::test]
    async fn test_renders_nothing_when_closed_empty() {
        let (report, fired) = run_with(vec![]).await;
        assert!(fired);
        assert_eq!(report.emitted, 0);
        assert!(report.emitter.is_empty());
    }

    #[tokio::test]
    async fn test_renders_many_in_order() {
        let (report, fired) = run_with(vec![3, 1, 2]).await;
        assert!(fired);
        assert_eq!(report.emitter, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_cancel_drops_signal() {
        let (_tx, rx) = mpsc::channel::<i64>(1);
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = Sink::new(Vec::new()).run(rx, done_tx, cancel).await;
        assert_eq!(report.emitted, 0);
        assert!(done_rx.await.is_err());
    }
}
