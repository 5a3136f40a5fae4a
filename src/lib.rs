//! @ai:module:intent Crank runner library: block/batch orchestration and inbound message bridge
//! @ai:module:layer application
//! @ai:module:public_api bridge, clock, config, engine, error, metrics, report, runner, store

pub mod bridge;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod store;

pub use bridge::{CorrelationId, CorrelationTable, InboundDevice, MessageBridge, PendingCall};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::RunnerConfig;
pub use engine::{Engine, QueueEngine};
pub use error::{Error, Result};
pub use metrics::{RunReport, StatsRecorder};
pub use report::ReportGenerator;
pub use runner::{BatchRunner, BenchmarkRunner, BlockRunner, Orchestrator};
pub use store::{open_store, FileStore, HostStore, MemoryStore, StorageMode};
