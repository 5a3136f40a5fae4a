//! @ai:module:intent Drive the engine in blocks, batches and benchmark rounds
//! @ai:module:layer application
//! @ai:module:public_api Orchestrator, Controller, BlockRunner, BatchRunner, BenchmarkRunner, CrankCounter, Diagnostics

pub mod batch;
pub mod benchmark;
pub mod block;
pub mod controller;
pub mod crank;
pub mod diagnostics;
pub mod orchestrator;

pub use batch::{BatchOutcome, BatchRunner};
pub use benchmark::BenchmarkRunner;
pub use block::{BlockOutcome, BlockRunner};
pub use controller::Controller;
pub use crank::CrankCounter;
pub use diagnostics::{Diagnostics, RefcountAuditor, StateDumper};
pub use orchestrator::Orchestrator;
