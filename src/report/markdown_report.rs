//! @ai:module:intent Markdown report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api MarkdownReporter
//! @ai:module:stateless true

use crate::metrics::{BenchmarkSummary, BlockRecord, RunReport};
use anyhow::Result;
use std::fmt::{self, Write as FmtWrite};
use std::path::Path;

/// @ai:intent Trait for Markdown report generation
pub trait MarkdownReporterTrait: Send + Sync {
    fn generate(&self, report: &RunReport, output_path: &Path) -> Result<()>;
}

/// @ai:intent Renders a `RunReport` as Markdown tables
pub struct MarkdownReporter;

impl MarkdownReporter {
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Format a signed stat delta
    /// @ai:effects pure
    fn format_delta(value: i64) -> String {
        if value > 0 {
            format!("+{}", value)
        } else {
            value.to_string()
        }
    }

    fn format_bytes(bytes: Option<u64>) -> String {
        match bytes {
            Some(b) if b >= 1024 * 1024 => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
            Some(b) if b >= 1024 => format!("{:.1} KiB", b as f64 / 1024.0),
            Some(b) => format!("{} B", b),
            None => "-".to_string(),
        }
    }

    /// @ai:effects pure
    fn generate_summary(report: &RunReport) -> Result<String, fmt::Error> {
        let mut output = String::new();
        let totals = &report.totals;

        writeln!(output, "# Crank Runner Statistics")?;
        writeln!(output)?;
        writeln!(output, "**Date:** {}", report.timestamp)?;
        writeln!(output, "**Block size:** {}", report.block_size)?;
        writeln!(output, "**Crank number:** {}", report.crank_number)?;
        writeln!(output)?;
        writeln!(output, "## Totals")?;
        writeln!(output)?;
        writeln!(output, "| Batches | Blocks | Units | Elapsed | Units/Block | ms/Block |")?;
        writeln!(output, "|---------|--------|-------|---------|-------------|----------|")?;
        writeln!(
            output,
            "| {} | {} | {} | {:.1}ms | {:.1} | {:.2} |",
            totals.batches,
            totals.blocks,
            totals.units,
            totals.elapsed_ms,
            totals.avg_units_per_block,
            totals.avg_ms_per_block
        )?;
        writeln!(output)?;

        Ok(output)
    }

    /// @ai:effects pure
    fn generate_benchmark_section(
        index: usize,
        summary: &BenchmarkSummary,
    ) -> Result<String, fmt::Error> {
        let mut output = String::new();

        writeln!(output, "## Benchmark {}", index + 1)?;
        writeln!(output)?;
        writeln!(
            output,
            "{} rounds over cranks {}..{}: {} units, {:.1} units/round, {:.2}ms/round",
            summary.rounds,
            summary.crank_before,
            summary.crank_after,
            summary.total_units,
            summary.avg_units_per_round,
            summary.avg_ms_per_round
        )?;
        writeln!(output)?;
        writeln!(
            output,
            "Fulfilled: {}, rejected: {}, inconclusive: {}",
            summary.fulfilled, summary.rejected, summary.inconclusive
        )?;
        writeln!(output)?;

        writeln!(output, "| Round | Result | Status | Units | Elapsed |")?;
        writeln!(output, "|-------|--------|--------|-------|---------|")?;
        for outcome in &summary.outcomes {
            writeln!(
                output,
                "| {} | r{} | {} | {} | {:.2}ms |",
                outcome.round,
                outcome.result,
                outcome.status.as_str(),
                outcome.units,
                outcome.elapsed_ms
            )?;
        }
        writeln!(output)?;

        if !summary.stat_deltas.is_empty() {
            writeln!(output, "| Stat | Delta | Per Round |")?;
            writeln!(output, "|------|-------|-----------|")?;
            for (name, delta) in &summary.stat_deltas {
                let per_round = summary.per_round.get(name).copied().unwrap_or(0.0);
                writeln!(
                    output,
                    "| {} | {} | {:.2} |",
                    name,
                    Self::format_delta(*delta),
                    per_round
                )?;
            }
            writeln!(output)?;
        }

        Ok(output)
    }

    /// @ai:effects pure
    fn generate_block_section(blocks: &[BlockRecord]) -> Result<String, fmt::Error> {
        let mut output = String::new();

        writeln!(output, "## Blocks")?;
        writeln!(output)?;
        writeln!(output, "| Block | Cranks | Units | Elapsed | Committed | Memory | Disk |")?;
        writeln!(output, "|-------|--------|-------|---------|-----------|--------|------|")?;
        for block in blocks {
            writeln!(
                output,
                "| {} | {}..{} | {}/{} | {:.2}ms | {} | {} | {} |",
                block.block,
                block.crank_start,
                block.crank_end,
                block.units,
                block.ceiling,
                block.elapsed_ms,
                if block.committed { "yes" } else { "no" },
                Self::format_bytes(block.memory_bytes),
                Self::format_bytes(block.disk_bytes)
            )?;
        }
        writeln!(output)?;

        Ok(output)
    }

    /// @ai:intent Render the whole report
    /// @ai:effects pure
    pub fn render(report: &RunReport) -> Result<String, fmt::Error> {
        let mut content = Self::generate_summary(report)?;

        for (index, summary) in report.benchmarks.iter().enumerate() {
            content.push_str(&Self::generate_benchmark_section(index, summary)?);
        }

        if !report.blocks.is_empty() {
            content.push_str(&Self::generate_block_section(&report.blocks)?);
        }

        Ok(content)
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownReporterTrait for MarkdownReporter {
    /// @ai:effects fs:write
    fn generate(&self, report: &RunReport, output_path: &Path) -> Result<()> {
        let content = Self::render(report)?;
        std::fs::write(output_path, content)?;
        Ok(())
    }
}
