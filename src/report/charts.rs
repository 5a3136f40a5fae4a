//! @ai:module:intent Chart generation for per-block statistics
//! @ai:module:layer infrastructure
//! @ai:module:public_api ChartGenerator
//! @ai:module:stateless true

use crate::metrics::{BlockRecord, RunReport};
use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

/// @ai:intent Trait for chart generation
pub trait ChartGeneratorTrait: Send + Sync {
    /// @ai:intent Generate every chart the report has data for
    fn generate_all(&self, report: &RunReport, output_dir: &Path) -> Result<Vec<String>>;
}

/// @ai:intent Draws block throughput and latency charts
pub struct ChartGenerator;

impl ChartGenerator {
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Units executed (top) and milliseconds (bottom) per block
    /// @ai:pre blocks is not empty
    /// @ai:effects fs:write
    fn generate_block_chart(&self, blocks: &[BlockRecord], output_path: &Path) -> Result<()> {
        let root = BitMapBackend::new(output_path, (900, 700)).into_drawing_area();
        root.fill(&WHITE)?;
        let (upper, lower) = root.split_vertically(350);

        let last = blocks.last().map(|b| b.block).unwrap_or(1);
        let first = blocks.first().map(|b| b.block).unwrap_or(0);
        let x_range = first..last + 1;

        let max_units = blocks.iter().map(|b| b.ceiling.max(b.units)).max().unwrap_or(1);
        let mut units_chart = ChartBuilder::on(&upper)
            .caption("Units per Block", ("sans-serif", 25))
            .margin(15)
            .x_label_area_size(35)
            .y_label_area_size(55)
            .build_cartesian_2d(x_range.clone(), 0u64..max_units + 1)?;

        units_chart
            .configure_mesh()
            .x_desc("Block")
            .y_desc("Units")
            .draw()?;

        units_chart
            .draw_series(LineSeries::new(
                blocks.iter().map(|b| (b.block, b.units)),
                BLUE.stroke_width(2),
            ))?
            .label("units")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

        units_chart.draw_series(
            blocks
                .iter()
                .filter(|b| b.committed)
                .map(|b| Circle::new((b.block, b.units), 3, GREEN.filled())),
        )?;

        units_chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .border_style(BLACK)
            .draw()?;

        let max_ms = blocks
            .iter()
            .map(|b| b.elapsed_ms)
            .fold(0.0f64, f64::max)
            .max(1.0);
        let mut time_chart = ChartBuilder::on(&lower)
            .caption("Milliseconds per Block", ("sans-serif", 25))
            .margin(15)
            .x_label_area_size(35)
            .y_label_area_size(55)
            .build_cartesian_2d(x_range, 0f64..max_ms * 1.1)?;

        time_chart
            .configure_mesh()
            .x_desc("Block")
            .y_desc("ms")
            .draw()?;

        time_chart.draw_series(LineSeries::new(
            blocks.iter().map(|b| (b.block, b.elapsed_ms)),
            RED.stroke_width(2),
        ))?;

        root.present()?;
        Ok(())
    }
}

impl Default for ChartGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartGeneratorTrait for ChartGenerator {
    /// @ai:effects fs:write
    fn generate_all(&self, report: &RunReport, output_dir: &Path) -> Result<Vec<String>> {
        std::fs::create_dir_all(output_dir)?;

        let mut generated = Vec::new();

        if report.blocks.is_empty() {
            tracing::debug!("No block records; skipping block chart");
            return Ok(generated);
        }

        self.generate_block_chart(&report.blocks, &output_dir.join("blocks.png"))?;
        generated.push("blocks.png".to_string());

        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RunTotals;
    use tempfile::TempDir;

    fn report(blocks: Vec<BlockRecord>) -> RunReport {
        RunReport {
            timestamp: "2026-01-19T00:00:00Z".to_string(),
            block_size: 200,
            crank_number: 450,
            totals: RunTotals::default(),
            blocks,
            batches: vec![],
            benchmarks: vec![],
        }
    }

    fn block(n: u64, units: u64, elapsed_ms: f64) -> BlockRecord {
        BlockRecord {
            block: n,
            crank_start: 0,
            crank_end: units,
            ceiling: 200,
            units,
            elapsed_ms,
            committed: true,
            memory_bytes: None,
            disk_bytes: None,
            engine_stats: None,
        }
    }

    #[test]
    fn test_generate_block_chart() {
        let temp = TempDir::new().unwrap();
        let report = report(vec![
            block(1, 200, 4.0),
            block(2, 200, 3.5),
            block(3, 50, 1.0),
        ]);

        let files = ChartGenerator::new()
            .generate_all(&report, temp.path())
            .unwrap();

        assert_eq!(files, vec!["blocks.png".to_string()]);
        assert!(temp.path().join("blocks.png").exists());
    }

    #[test]
    fn test_no_blocks_no_chart() {
        let temp = TempDir::new().unwrap();
        let files = ChartGenerator::new()
            .generate_all(&report(vec![]), temp.path())
            .unwrap();

        assert!(files.is_empty());
        assert!(!temp.path().join("blocks.png").exists());
    }
}
