//! @ai:module:intent Report generation for run statistics
//! @ai:module:layer infrastructure
//! @ai:module:public_api ReportGenerator, JsonReporter, MarkdownReporter, ChartGenerator

pub mod charts;
pub mod json_report;
pub mod markdown_report;

pub use charts::{ChartGenerator, ChartGeneratorTrait};
pub use json_report::{JsonReporter, JsonReporterTrait};
pub use markdown_report::{MarkdownReporter, MarkdownReporterTrait};

use crate::metrics::RunReport;
use anyhow::Result;
use std::path::Path;

/// @ai:intent Combined report generator
pub struct ReportGenerator {
    json: JsonReporter,
    markdown: MarkdownReporter,
    charts: ChartGenerator,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            json: JsonReporter::new(),
            markdown: MarkdownReporter::new(),
            charts: ChartGenerator::new(),
        }
    }

    /// @ai:intent Write stats.json, stats.md and, when blocks were recorded, blocks.png
    /// @ai:effects fs:write
    pub fn generate_all(&self, report: &RunReport, output_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(output_dir)?;

        self.json.generate(report, &output_dir.join("stats.json"))?;
        self.markdown.generate(report, &output_dir.join("stats.md"))?;
        self.charts.generate_all(report, output_dir)?;

        tracing::info!("Reports generated in {}", output_dir.display());
        Ok(())
    }

    /// @ai:intent Load a stats.json written by an earlier run
    /// @ai:effects fs:read
    pub fn load(&self, stats_path: &Path) -> Result<RunReport> {
        self.json.load(stats_path)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RunTotals;
    use tempfile::TempDir;

    #[test]
    fn test_generate_all_without_blocks() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("reports");
        let report = RunReport {
            timestamp: "2026-01-19T00:00:00Z".to_string(),
            block_size: 10,
            crank_number: 0,
            totals: RunTotals::default(),
            blocks: vec![],
            batches: vec![],
            benchmarks: vec![],
        };

        let generator = ReportGenerator::new();
        generator.generate_all(&report, &out).unwrap();

        assert!(out.join("stats.json").exists());
        assert!(out.join("stats.md").exists());
        assert!(!out.join("blocks.png").exists());
        assert_eq!(generator.load(&out.join("stats.json")).unwrap().block_size, 10);
    }
}
