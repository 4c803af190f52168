//! Run report generation.
//!
//! This module renders a finished pipeline run as plain text or JSON.

use crate::cli::ReportFormat;
use crate::models::{RunMetadata, RunReport, Verification};
use crate::numeric::Numeric;
use crate::pipeline::{ProducerReport, SourceStats};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Generate a complete plain-text report.
pub fn generate_text_report<N: Numeric>(report: &RunReport<N>) -> String {
    let mut output = String::new();

    output.push_str("fanin run report\n");
    output.push_str("================\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_result_section(report));
    output.push_str(&generate_sources_section(&report.sources));
    output.push_str(&generate_producers_section(&report.producers));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("Run\n---\n");
    section.push_str(&format!(
        "  Started:    {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("  Type:       {}\n", metadata.kind));
    section.push_str(&format!("  Transform:  {}\n", metadata.transform));
    section.push_str(&format!("  Producers:  {}\n", metadata.producers));
    section.push_str(&format!("  Length:     {}\n", metadata.length));
    section.push_str(&format!("  Capacity:   {}\n", metadata.capacity));
    section.push_str(&format!(
        "  Duration:   {:.3}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the result section.
fn generate_result_section<N: Numeric>(report: &RunReport<N>) -> String {
    let mut section = String::new();

    section.push_str("Result\n------\n");
    section.push_str(&format!("  Total:      {}\n", report.total));
    section.push_str(&format!("  Rendered:   {}\n", report.emitted));
    section.push_str(&format!("  Consumed:   {} items\n", report.items_consumed()));
    match (report.verification, report.expected) {
        (Verification::Skipped, _) => {}
        (verification, Some(expected)) => {
            section.push_str(&format!(
                "  Verify:     {} (expected {})\n",
                verification, expected
            ));
        }
        (verification, None) => {
            section.push_str(&format!(
                "  Verify:     {} (reference overflows)\n",
                verification
            ));
        }
    }
    section.push('\n');

    section
}

/// Generate the per-source table.
fn generate_sources_section(sources: &[SourceStats]) -> String {
    if sources.is_empty() {
        return "Sources\n-------\n  (none)\n\n".to_string();
    }

    let mut section = String::new();

    section.push_str("Sources\n-------\n");
    section.push_str("  source     items  closed\n");
    for stats in sources {
        section.push_str(&format!(
            "  {:<9} {:>6}  {:>6}\n",
            stats.source.to_string(),
            stats.items,
            stats.closed_observations
        ));
    }
    section.push('\n');

    section
}

/// Generate the producer summary; lists only the ones that stopped early.
fn generate_producers_section(producers: &[ProducerReport]) -> String {
    let stopped: Vec<_> = producers.iter().filter(|p| !p.completed).collect();

    let mut section = String::new();
    section.push_str("Producers\n---------\n");
    section.push_str(&format!(
        "  {} of {} completed\n",
        producers.len() - stopped.len(),
        producers.len()
    ));
    for producer in stopped {
        section.push_str(&format!(
            "  {} stopped after {} items\n",
            producer.source, producer.sent
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report<N: Numeric>(report: &RunReport<N>) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write the report to a file in the given format.
pub fn write_report<N: Numeric>(report: &RunReport<N>, format: ReportFormat, path: &Path) -> Result<()> {
    let content = match format {
        ReportFormat::Text => generate_text_report(report),
        ReportFormat::Json => generate_json_report(report)?,
    };

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NumericKind, TransformKind};
    use crate::pipeline::source::SourceId;
    use chrono::Utc;

    fn create_test_report() -> RunReport<i64> {
        RunReport {
            metadata: RunMetadata {
                started_at: Utc::now(),
                kind: NumericKind::I64,
                transform: TransformKind::Square,
                producers: 2,
                length: 5,
                capacity: 5,
                duration_seconds: 0.004,
            },
            total: 708,
            expected: Some(708),
            verification: Verification::Matched,
            emitted: 1,
            sources: vec![
                SourceStats { source: SourceId(0), items: 5, closed_observations: 1 },
                SourceStats { source: SourceId(1), items: 5, closed_observations: 1 },
            ],
            producers: vec![
                ProducerReport { source: SourceId(0), sent: 5, completed: true },
                ProducerReport { source: SourceId(1), sent: 5, completed: true },
            ],
        }
    }

    #[test]
    fn test_generate_text_report() {
        let report = create_test_report();
        let text = generate_text_report(&report);

        assert!(text.contains("fanin run report"));
        assert!(text.contains("Total:      708"));
        assert!(text.contains("Consumed:   10 items"));
        assert!(text.contains("matched (expected 708)"));
        assert!(text.contains("source#1"));
        assert!(text.contains("2 of 2 completed"));
    }

    #[test]
    fn test_result_section_without_verification() {
        let mut report = create_test_report();
        report.verification = Verification::Skipped;
        report.expected = None;

        let section = generate_result_section(&report);
        assert!(!section.contains("Verify"));
    }

    #[test]
    fn test_producers_section_lists_stopped() {
        let producers = vec![
            ProducerReport { source: SourceId(0), sent: 5, completed: true },
            ProducerReport { source: SourceId(3), sent: 2, completed: false },
        ];

        let section = generate_producers_section(&producers);
        assert!(section.contains("1 of 2 completed"));
        assert!(section.contains("source#3 stopped after 2 items"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total"], 708);
        assert_eq!(value["verification"], "matched");
        assert_eq!(value["metadata"]["kind"], "i64");
        assert_eq!(value["sources"][1]["source"], 1);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        write_report(&create_test_report(), ReportFormat::Json, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"closed_observations\": 1"));
    }
}
