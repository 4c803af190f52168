//! Wiring: N producers, one aggregator, one sink, one completion signal.

use crate::numeric::Numeric;
use crate::pipeline::aggregator::{Aggregator, SourceSet, SourceStats};
use crate::pipeline::error::PipelineError;
use crate::pipeline::producer::{Producer, ProducerReport, Transform};
use crate::pipeline::sink::{Emit, Sink};
use crate::pipeline::source::{source_channel, SourceId};
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest capacity a bounded tokio channel accepts.
pub const MAX_CAPACITY: usize = Semaphore::MAX_PERMITS;

/// Result of a pipeline that ran to completion.
#[derive(Debug)]
pub struct PipelineOutcome<N, E> {
    /// Sum of squares over every value every producer emitted.
    pub total: N,
    /// Values the sink rendered.
    pub emitted: usize,
    pub sources: Vec<SourceStats>,
    pub producers: Vec<ProducerReport>,
    /// The emitter, handed back after the sink finished.
    pub emitter: E,
}

enum Signal {
    Fired,
    Dropped,
    Cancelled,
    TimedOut(Duration),
}

/// Builds and runs one fan-out/fan-in pipeline.
///
/// Five producers squaring the indices `0..5` give a total of 1770:
///
/// ```text
/// Coordinator::new(5, 5i64, square)
///     .deadline(Duration::from_secs(10))
///     .run(StdoutEmitter)
///     .await?
/// ```
pub struct Coordinator<N> {
    producers: usize,
    bound: N,
    transform: Transform<N>,
    capacity: Option<usize>,
    stagger: Duration,
    delays: Vec<Duration>,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl<N: Numeric> Coordinator<N> {
    /// `producers` producers, each emitting `transform(i)` for `i` in `[0, bound)`.
    pub fn new(producers: usize, bound: N, transform: Transform<N>) -> Self {
        Self {
            producers,
            bound,
            transform,
            capacity: None,
            stagger: Duration::ZERO,
            delays: Vec::new(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Capacity of every source channel. Defaults to the sequence length,
    /// capped at `MAX_CAPACITY`. Must be in `1..=MAX_CAPACITY`.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Producer `i` sleeps `i * step` before each item.
    pub fn stagger(mut self, step: Duration) -> Self {
        self.stagger = step;
        self
    }

    /// Explicit per-item delay for each producer, by index.
    ///
    /// Added on top of any stagger. Producers past the end get no delay.
    #[allow(dead_code)] // The CLI only exposes stagger
    pub fn producer_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Cancel the run if it has not completed within `deadline`.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cancelling `token` stops every task of the run.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn effective_capacity(&self) -> usize {
        self.capacity
            .unwrap_or_else(|| self.bound.index_count().clamp(1, MAX_CAPACITY))
    }

    fn delay_for(&self, index: usize) -> Duration {
        let explicit = self.delays.get(index).copied().unwrap_or_default();
        let step = u32::try_from(index).unwrap_or(u32::MAX);
        explicit.saturating_add(self.stagger.saturating_mul(step))
    }

    /// Run the pipeline and wait for the sink's completion signal.
    ///
    /// # Panics
    /// Re-raises a panic from any pipeline task (a broken channel invariant).
    pub async fn run<E: Emit<N>>(self, emitter: E) -> Result<PipelineOutcome<N, E>, PipelineError> {
        let capacity = self.effective_capacity();
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(PipelineError::InvalidCapacity(capacity));
        }

        info!(
            "Starting {} producers (bound {}, capacity {})",
            self.producers, self.bound, capacity
        );

        // A child token lets the deadline stop this run without touching the caller's token.
        let cancel = self.cancel.child_token();

        let mut sources = Vec::with_capacity(self.producers);
        let mut producer_tasks = Vec::with_capacity(self.producers);
        for index in 0..self.producers {
            let id = SourceId(index);
            let (sender, source) = source_channel(capacity);
            let producer =
                Producer::new(id, self.bound, self.transform).with_delay(self.delay_for(index));
            producer_tasks.push(tokio::spawn(producer.run(sender, cancel.clone())));
            sources.push((id, source));
        }

        let (results_tx, results_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();

        let aggregator = tokio::spawn(Aggregator::new().run(
            SourceSet::new(sources),
            results_tx,
            cancel.clone(),
        ));
        let sink = tokio::spawn(Sink::new(emitter).run(results_rx, done_tx, cancel.clone()));

        let signal = self.await_completion(done_rx, &cancel).await;

        // Every task ends on its own once the signal fired or the token was cancelled.
        let producers = join_all(producer_tasks)
            .await
            .into_iter()
            .map(joined)
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate = joined(aggregator.await)?;
        let sink = joined(sink.await)?;
        debug!("All pipeline tasks joined");

        match signal {
            Signal::Cancelled => return Err(PipelineError::Cancelled),
            Signal::TimedOut(limit) => return Err(PipelineError::TimedOut(limit)),
            Signal::Fired | Signal::Dropped => {}
        }

        let aggregate = aggregate?;
        if matches!(signal, Signal::Dropped) {
            return Err(PipelineError::CompletionLost);
        }

        Ok(PipelineOutcome {
            total: aggregate.total,
            emitted: sink.emitted,
            sources: aggregate.sources,
            producers,
            emitter: sink.emitter,
        })
    }

    async fn await_completion(
        &self,
        done: oneshot::Receiver<()>,
        cancel: &CancellationToken,
    ) -> Signal {
        let limit = self.deadline;
        let expiry = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Pipeline cancelled before completion");
                Signal::Cancelled
            }
            _ = expiry => {
                let limit = limit.unwrap_or_default();
                warn!("Pipeline exceeded its deadline of {:?}, cancelling", limit);
                cancel.cancel();
                Signal::TimedOut(limit)
            }
            fired = done => match fired {
                Ok(()) => Signal::Fired,
                Err(_) => Signal::Dropped,
            },
        }
    }
}

fn joined<T>(result: Result<T, JoinError>) -> Result<T, PipelineError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(PipelineError::TaskAborted(err.to_string())),
    }
}

/// Sequential reference for what a run should produce:
/// `producers * sum(transform(i)^2 for i in [0, bound))`.
///
/// `None` if the total does not fit in `N`.
pub fn expected_total<N: Numeric>(producers: usize, bound: N, transform: Transform<N>) -> Option<N> {
    let mut per_producer = N::ZERO;
    for index in 0..bound.index_count() {
        per_producer = per_producer.checked_add_square(transform(N::from_index(index)))?;
    }

    let mut total = N::ZERO;
    for _ in 0..producers {
        total = total.checked_add(per_producer)?;
    }
    Some(total)
}
