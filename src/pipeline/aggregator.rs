//! Fan-in aggregation over all open source channels.
//!
//! `SourceSet` multiplexes the open sources into a single stream of tagged
//! events. `Aggregator` folds those events into a sum of squares and hands
//! the total to the result channel once every source is exhausted.

use crate::numeric::Numeric;
use crate::pipeline::error::PipelineError;
use crate::pipeline::source::SourceId;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One wake-up of the multiplexed read.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent<N> {
    /// A value arrived from `source`.
    Item { source: SourceId, value: N },
    /// `source` closed and has been removed from the set.
    Exhausted { source: SourceId },
}

/// The sources that are still open.
///
/// Polled as a `Stream`, it scans the open sources round-robin starting
/// after the one serviced last and yields the first ready event. A source
/// that reports closed is swap-removed in O(1) and never polled again. The
/// stream ends once the set is empty.
pub struct SourceSet<S> {
    active: Vec<(SourceId, S)>,
    cursor: usize,
}

impl<S> SourceSet<S> {
    pub fn new(sources: impl IntoIterator<Item = (SourceId, S)>) -> Self {
        Self {
            active: sources.into_iter().collect(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.active.iter().map(|(id, _)| *id)
    }
}

impl<S, N> Stream for SourceSet<S>
where
    S: Stream<Item = N> + Unpin,
{
    type Item = SourceEvent<N>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let len = this.active.len();
        if len == 0 {
            return Poll::Ready(None);
        }

        for step in 0..len {
            let idx = (this.cursor + step) % len;
            let source = this.active[idx].0;
            let polled = Pin::new(&mut this.active[idx].1).poll_next(cx);

            match polled {
                Poll::Ready(Some(value)) => {
                    this.cursor = (idx + 1) % len;
                    return Poll::Ready(Some(SourceEvent::Item { source, value }));
                }
                Poll::Ready(None) => {
                    // One removal per event, so no index shifts mid-scan.
                    this.active.swap_remove(idx);
                    this.cursor = if this.active.is_empty() {
                        0
                    } else {
                        idx % this.active.len()
                    };
                    return Poll::Ready(Some(SourceEvent::Exhausted { source }));
                }
                Poll::Pending => {}
            }
        }

        // Every open source has registered the waker.
        Poll::Pending
    }
}

/// Per-source bookkeeping kept by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub source: SourceId,
    /// Values consumed from this source.
    pub items: usize,
    /// How many times the source was seen closed. Exactly 1 after a full run.
    pub closed_observations: usize,
}

/// Final state of a completed aggregation.
#[derive(Debug, Clone)]
pub struct AggregateReport<N> {
    pub total: N,
    pub sources: Vec<SourceStats>,
}

/// Sum-of-squares accumulator over a `SourceSet`.
pub struct Aggregator<N> {
    total: N,
    stats: BTreeMap<SourceId, SourceStats>,
}

impl<N: Numeric> Default for Aggregator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Numeric> Aggregator<N> {
    pub fn new() -> Self {
        Self {
            total: N::ZERO,
            stats: BTreeMap::new(),
        }
    }

    /// Drain `sources`, then send the total on `results` and close it.
    ///
    /// On overflow or cancellation nothing is sent; `results` is still
    /// closed when this returns.
    pub async fn run<S>(
        mut self,
        mut sources: SourceSet<S>,
        results: mpsc::Sender<N>,
        cancel: CancellationToken,
    ) -> Result<AggregateReport<N>, PipelineError>
    where
        S: Stream<Item = N> + Unpin,
    {
        for source in sources.ids() {
            self.stats.insert(
                source,
                SourceStats {
                    source,
                    items: 0,
                    closed_observations: 0,
                },
            );
        }
        if sources.is_empty() {
            debug!("No sources to aggregate, total stays zero");
        } else {
            debug!("Aggregating over {} sources", sources.len());
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Aggregator cancelled with {} sources still open", sources.len());
                    return Err(PipelineError::Cancelled);
                }
                event = sources.next() => event,
            };

            match event {
                Some(event) => self.absorb(event)?,
                None => break,
            }
        }

        info!("All sources exhausted, total = {}", self.total);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            sent = results.send(self.total) => {
                if sent.is_err() {
                    warn!("Result reader dropped before the total was delivered");
                }
            }
        }

        Ok(AggregateReport {
            total: self.total,
            sources: self.stats.into_values().collect(),
        })
    }

    fn absorb(&mut self, event: SourceEvent<N>) -> Result<(), PipelineError> {
        match event {
            SourceEvent::Item { source, value } => {
                let stats = self.stats_mut(source);
                assert_eq!(
                    stats.closed_observations, 0,
                    "{source} produced a value after closing"
                );
                stats.items += 1;

                self.total = self.total.checked_add_square(value).ok_or_else(|| {
                    warn!("Accumulator overflow on value {} from {}", value, source);
                    PipelineError::Overflow { source_id: source }
                })?;
            }
            SourceEvent::Exhausted { source } => {
                let stats = self.stats_mut(source);
                stats.closed_observations += 1;
                assert_eq!(
                    stats.closed_observations, 1,
                    "{source} observed closed more than once"
                );
                debug!("{} exhausted after {} items", source, stats.items);
            }
        }
        Ok(())
    }

    fn stats_mut(&mut self, source: SourceId) -> &mut SourceStats {
        self.stats.entry(source).or_insert(SourceStats {
            source,
            items: 0,
            closed_observations: 0,
        })
    }
}
