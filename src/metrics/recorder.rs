//! @ai:module:intent Accumulate block, batch and benchmark records into a run report
//! @ai:module:layer application
//! @ai:module:public_api StatsRecorder, BlockProbe, resident_memory_bytes
//! @ai:module:stateless false

use crate::config::StatsConfig;
use crate::metrics::types::{
    BatchRecord, BenchmarkSummary, BlockRecord, RunReport, RunTotals,
};

/// @ai:intent Which resource measurements to take for each block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockProbe {
    pub memory: bool,
    pub disk: bool,
    pub engine_stats: bool,
}

/// @ai:intent Collects structured measurements for later export
///
/// Batch and benchmark records are always kept. Block records are only kept
/// when some per-block statistic was switched on at construction.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    probe: Option<BlockProbe>,
    blocks: Vec<BlockRecord>,
    batches: Vec<BatchRecord>,
    benchmarks: Vec<BenchmarkSummary>,
}

impl StatsRecorder {
    /// @ai:intent Build a recorder whose per-block probe is fixed by config
    /// @ai:effects pure
    pub fn from_config(config: &StatsConfig) -> Self {
        let per_block =
            config.log_blocks || config.log_memory || config.log_disk || config.log_engine_stats;

        let probe = per_block.then_some(BlockProbe {
            memory: config.log_memory,
            disk: config.log_disk,
            engine_stats: config.log_engine_stats,
        });

        Self {
            probe,
            ..Default::default()
        }
    }

    /// @ai:intent Per-block probe, or None when block records are off
    pub fn block_probe(&self) -> Option<BlockProbe> {
        self.probe
    }

    pub fn record_block(&mut self, record: BlockRecord) {
        self.blocks.push(record);
    }

    pub fn record_batch(&mut self, record: BatchRecord) {
        self.batches.push(record);
    }

    pub fn record_benchmark(&mut self, summary: BenchmarkSummary) {
        self.benchmarks.push(summary);
    }

    pub fn blocks(&self) -> &[BlockRecord] {
        &self.blocks
    }

    pub fn batches(&self) -> &[BatchRecord] {
        &self.batches
    }

    pub fn benchmarks(&self) -> &[BenchmarkSummary] {
        &self.benchmarks
    }

    /// @ai:intent Aggregate totals over every recorded batch
    /// @ai:effects pure
    pub fn totals(&self) -> RunTotals {
        let units: u64 = self.batches.iter().map(|b| b.units).sum();
        let blocks: u64 = self.batches.iter().map(|b| b.blocks).sum();
        let elapsed_ms: f64 = self.batches.iter().map(|b| b.elapsed_ms).sum();

        let (avg_units_per_block, avg_ms_per_block) = if blocks == 0 {
            (0.0, 0.0)
        } else {
            (units as f64 / blocks as f64, elapsed_ms / blocks as f64)
        };

        RunTotals {
            units,
            blocks,
            batches: self.batches.len() as u64,
            elapsed_ms,
            avg_units_per_block,
            avg_ms_per_block,
        }
    }

    /// @ai:intent Snapshot everything recorded so far into an exportable report
    /// @ai:effects time
    pub fn report(&self, block_size: u64, crank_number: u64) -> RunReport {
        RunReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            block_size,
            crank_number,
            totals: self.totals(),
            blocks: self.blocks.clone(),
            batches: self.batches.clone(),
            benchmarks: self.benchmarks.clone(),
        }
    }
}

/// @ai:intent Resident set size of this process
/// @ai:effects fs:read
#[cfg(target_os = "linux")]
pub fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
pub fn resident_memory_bytes() -> Option<u64> {
    None
}

/// @ai:intent Extract VmRSS (reported in kB) from /proc status text
/// @ai:effects pure
fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}
