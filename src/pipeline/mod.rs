//! The fan-out/fan-in pipeline.
//!
//! ```text
//! Producer[0..N] --(N source channels)--> Aggregator --(result)--> Sink --(done)--> Coordinator
//! ```
//!
//! Tasks talk only through channels. Each source channel has a single
//! writer and a single reader; the accumulator and the set of open sources
//! belong to the aggregator task alone.

pub mod aggregator;
pub mod coordinator;
pub mod error;
pub mod producer;
pub mod sink;
pub mod source;

pub use aggregator::SourceStats;
pub use coordinator::{expected_total, Coordinator};
pub use producer::{ProducerReport, Transform};
pub use sink::StdoutEmitter;
