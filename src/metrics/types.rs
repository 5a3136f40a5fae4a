//! @ai:module:intent Record types for block, batch and benchmark statistics
//! @ai:module:layer domain
//! @ai:module:public_api BlockRecord, BatchRecord, RoundOutcome, BenchmarkWindow, BenchmarkSummary, RunTotals, RunReport
//! @ai:module:stateless true

use crate::engine::{EngineStats, ResultId, ResultStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// @ai:intent Measurements for one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block: u64,
    pub crank_start: u64,
    pub crank_end: u64,
    pub ceiling: u64,
    pub units: u64,
    pub elapsed_ms: f64,
    pub committed: bool,
    #[serde(default)]
    pub memory_bytes: Option<u64>,
    #[serde(default)]
    pub disk_bytes: Option<u64>,
    #[serde(default)]
    pub engine_stats: Option<EngineStats>,
}

/// @ai:intent Totals for one batch of blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub step_limit: u64,
    pub units: u64,
    pub blocks: u64,
    pub elapsed_ms: f64,
}

/// @ai:intent What one benchmark round's queued call ended as after its drain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u32,
    pub result: ResultId,
    pub status: ResultStatus,
    #[serde(default)]
    pub value: Option<Value>,
    pub units: u64,
    pub elapsed_ms: f64,
}

impl RoundOutcome {
    /// @ai:intent A round whose call was still unsettled after a full drain
    /// @ai:effects pure
    pub fn is_inconclusive(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// @ai:intent Engine stats and crank counter sampled around a benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkWindow {
    pub rounds: u32,
    pub crank_before: u64,
    pub crank_after: u64,
    pub stats_before: EngineStats,
    pub stats_after: EngineStats,
}

impl BenchmarkWindow {
    /// @ai:intent Per-stat change across the window
    /// @ai:effects pure
    pub fn deltas(&self) -> BTreeMap<String, i64> {
        let mut keys: Vec<&String> = self
            .stats_before
            .keys()
            .chain(self.stats_after.keys())
            .collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .map(|key| {
                let before = self.stats_before.get(key).copied().unwrap_or(0) as i64;
                let after = self.stats_after.get(key).copied().unwrap_or(0) as i64;
                (key.clone(), after - before)
            })
            .collect()
    }

    /// @ai:intent Turn the window and its rounds into a summary with per-round averages
    /// @ai:pre rounds > 0
    /// @ai:effects pure
    pub fn summarize(&self, elapsed: Duration, outcomes: Vec<RoundOutcome>) -> BenchmarkSummary {
        let rounds = f64::from(self.rounds.max(1));
        let total_units = self.crank_after.saturating_sub(self.crank_before);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let stat_deltas = self.deltas();
        let per_round = stat_deltas
            .iter()
            .map(|(key, delta)| (key.clone(), *delta as f64 / rounds))
            .collect();

        let fulfilled = count_status(&outcomes, ResultStatus::Fulfilled);
        let rejected = count_status(&outcomes, ResultStatus::Rejected);
        let inconclusive = outcomes.iter().filter(|o| o.is_inconclusive()).count() as u32;

        BenchmarkSummary {
            rounds: self.rounds,
            crank_before: self.crank_before,
            crank_after: self.crank_after,
            total_units,
            elapsed_ms,
            avg_units_per_round: total_units as f64 / rounds,
            avg_ms_per_round: elapsed_ms / rounds,
            stat_deltas,
            per_round,
            fulfilled,
            rejected,
            inconclusive,
            outcomes,
        }
    }
}

fn count_status(outcomes: &[RoundOutcome], status: ResultStatus) -> u32 {
    outcomes.iter().filter(|o| o.status == status).count() as u32
}

/// @ai:intent Benchmark result with per-round derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub rounds: u32,
    pub crank_before: u64,
    pub crank_after: u64,
    pub total_units: u64,
    pub elapsed_ms: f64,
    pub avg_units_per_round: f64,
    pub avg_ms_per_round: f64,
    pub stat_deltas: BTreeMap<String, i64>,
    pub per_round: BTreeMap<String, f64>,
    pub fulfilled: u32,
    pub rejected: u32,
    pub inconclusive: u32,
    pub outcomes: Vec<RoundOutcome>,
}

/// @ai:intent Aggregate figures over every recorded batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub units: u64,
    pub blocks: u64,
    pub batches: u64,
    pub elapsed_ms: f64,
    pub avg_units_per_block: f64,
    pub avg_ms_per_block: f64,
}

/// @ai:intent Complete statistics of a run, as exported to reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: String,
    pub block_size: u64,
    pub crank_number: u64,
    pub totals: RunTotals,
    pub blocks: Vec<BlockRecord>,
    pub batches: Vec<BatchRecord>,
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkSummary>,
}
