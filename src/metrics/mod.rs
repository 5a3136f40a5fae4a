//! @ai:module:intent Statistics collection for blocks, batches and benchmarks
//! @ai:module:layer application
//! @ai:module:public_api StatsRecorder, BlockProbe, BlockRecord, BatchRecord, RoundOutcome, BenchmarkWindow, BenchmarkSummary, RunReport, RunTotals

pub mod recorder;
pub mod types;

pub use recorder::{resident_memory_bytes, BlockProbe, StatsRecorder};
pub use types::{
    BatchRecord, BenchmarkSummary, BenchmarkWindow, BlockRecord, RoundOutcome, RunReport,
    RunTotals,
};
