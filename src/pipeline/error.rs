use thiserror::Error;

use super::source::SourceId;

/// Ways a pipeline run can end without a result.
///
/// Invariant violations (reading a source after it closed) are not listed
/// here: they panic.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline cancelled")]
    Cancelled,

    #[error("pipeline did not finish within {0:?}")]
    TimedOut(std::time::Duration),

    #[error("accumulator overflowed while consuming {source_id}")]
    Overflow { source_id: SourceId },

    #[error("source channel capacity {0} is outside 1..={max}", max = tokio::sync::Semaphore::MAX_PERMITS)]
    InvalidCapacity(usize),

    #[error("sink exited without raising the completion signal")]
    CompletionLost,

    #[error("pipeline task aborted: {0}")]
    TaskAborted(String),
}
