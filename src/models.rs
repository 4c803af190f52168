//! Data models shared by the CLI, config and report layers.

use crate::numeric::{self, Numeric};
use crate::pipeline::{ProducerReport, SourceStats, Transform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric type the pipeline runs over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    I32,
    #[default]
    I64,
    U64,
    F32,
    F64,
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericKind::I32 => write!(f, "i32"),
            NumericKind::I64 => write!(f, "i64"),
            NumericKind::U64 => write!(f, "u64"),
            NumericKind::F32 => write!(f, "f32"),
            NumericKind::F64 => write!(f, "f64"),
        }
    }
}

/// Transform each producer applies to its indices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Identity,
    #[default]
    Square,
    Double,
    Cube,
}

impl TransformKind {
    /// The transform as a function over `N`.
    pub fn function<N: Numeric>(self) -> Transform<N> {
        match self {
            TransformKind::Identity => numeric::identity::<N>,
            TransformKind::Square => numeric::square::<N>,
            TransformKind::Double => numeric::double::<N>,
            TransformKind::Cube => numeric::cube::<N>,
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::Identity => write!(f, "identity"),
            TransformKind::Square => write!(f, "square"),
            TransformKind::Double => write!(f, "double"),
            TransformKind::Cube => write!(f, "cube"),
        }
    }
}

/// Parameters and timing of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub kind: NumericKind,
    pub transform: TransformKind,
    pub producers: usize,
    pub length: u32,
    pub capacity: usize,
    pub duration_seconds: f64,
}

/// Outcome of comparing the pipeline total with the sequential reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    /// `--verify` was not requested.
    Skipped,
    Matched,
    Mismatched,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Skipped => write!(f, "skipped"),
            Verification::Matched => write!(f, "matched"),
            Verification::Mismatched => write!(f, "MISMATCHED"),
        }
    }
}

/// Everything written to `--output` after a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<N> {
    pub metadata: RunMetadata,
    pub total: N,
    /// Sequential reference, when verification was requested and it fits in `N`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<N>,
    pub verification: Verification,
    /// Values the sink rendered.
    pub emitted: usize,
    pub sources: Vec<SourceStats>,
    pub producers: Vec<ProducerReport>,
}

impl<N: Numeric> RunReport<N> {
    /// Number of values consumed across every source.
    pub fn items_consumed(&self) -> usize {
        self.sources.iter().map(|s| s.items).sum()
    }

    /// Whether every producer ran its sequence to the end.
    pub fn all_producers_completed(&self) -> bool {
        self.producers.iter().all(|p| p.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::SourceId;

    #[test]
    fn test_transform_kind_functions() {
        assert_eq!(TransformKind::Square.function::<i64>()(7), 49);
        assert_eq!(TransformKind::Identity.function::<u64>()(7), 7);
        assert_eq!(TransformKind::Double.function::<f64>()(1.5), 3.0);
        assert_eq!(TransformKind::Cube.function::<i32>()(-3), -27);
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: NumericKind = serde_json::from_str("\"f32\"").unwrap();
        assert_eq!(kind, NumericKind::F32);
        assert_eq!(serde_json::to_string(&TransformKind::Cube).unwrap(), "\"cube\"");
        assert_eq!(NumericKind::default().to_string(), "i64");
    }

    #[test]
    fn test_report_helpers() {
        let report = RunReport {
            metadata: RunMetadata {
                started_at: Utc::now(),
                kind: NumericKind::I64,
                transform: TransformKind::Square,
                producers: 2,
                length: 3,
                capacity: 3,
                duration_seconds: 0.01,
            },
            total: 10i64,
            expected: Some(10),
            verification: Verification::Matched,
            emitted: 1,
            sources: vec![
                SourceStats { source: SourceId(0), items: 3, closed_observations: 1 },
                SourceStats { source: SourceId(1), items: 2, closed_observations: 1 },
            ],
            producers: vec![
                ProducerReport { source: SourceId(0), sent: 3, completed: true },
                ProducerReport { source: SourceId(1), sent: 2, completed: false },
            ],
        };

        assert_eq!(report.items_consumed(), 5);
        assert!(!report.all_producers_completed());
    }
}
