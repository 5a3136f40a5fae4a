//! @ai:module:intent Own the engine, store and runners built once from configuration
//! @ai:module:layer application
//! @ai:module:public_api Orchestrator
//! @ai:module:stateless false

use crate::clock::{Clock, MonotonicClock};
use crate::config::RunnerConfig;
use crate::engine::{Engine, EngineStats};
use crate::error::Result;
use crate::metrics::{BenchmarkSummary, RunReport, StatsRecorder};
use crate::runner::batch::{BatchOutcome, BatchRunner};
use crate::runner::benchmark::BenchmarkRunner;
use crate::runner::block::BlockRunner;
use crate::runner::controller::Controller;
use crate::runner::diagnostics::Diagnostics;
use crate::store::HostStore;
use std::sync::Arc;
use std::time::Duration;

/// @ai:intent Top-level driver; every drain of the engine goes through `&mut self`
pub struct Orchestrator<E: Engine, S: HostStore> {
    ctl: Controller<E, S>,
    batch: BatchRunner,
    benchmark: BenchmarkRunner,
    config: RunnerConfig,
}

impl<E: Engine, S: HostStore> Orchestrator<E, S> {
    /// @ai:intent Validate config, recover durable state and assemble runners
    /// @ai:post crank_number() equals the last committed counter (0 after reset)
    /// @ai:effects fs:read, fs:write
    pub fn open(engine: E, store: S, config: &RunnerConfig) -> Result<Self> {
        Self::with_clock(engine, store, config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        engine: E,
        store: S,
        config: &RunnerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let ctl = Controller::open(engine, store, config.run.force_reset)?;
        let diagnostics = Diagnostics::from_config(&config.diagnostics);
        if !diagnostics.is_empty() {
            tracing::info!("Diagnostics enabled: {:?}", config.diagnostics);
        }

        let block = BlockRunner::new(
            clock,
            diagnostics,
            StatsRecorder::from_config(&config.stats),
        );

        tracing::info!(
            "Orchestrator ready at crank {} (block size {})",
            ctl.crank_number(),
            config.run.block_size
        );

        Ok(Self {
            ctl,
            batch: BatchRunner::new(block, config.run.block_size),
            benchmark: BenchmarkRunner::from_config(&config.benchmark),
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn crank_number(&self) -> u64 {
        self.ctl.crank_number()
    }

    pub fn engine(&self) -> &E {
        self.ctl.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.ctl.engine_mut()
    }

    pub fn store(&self) -> &S {
        self.ctl.store()
    }

    pub fn stats(&self) -> EngineStats {
        self.ctl.engine().stats()
    }

    pub fn recorder(&self) -> &StatsRecorder {
        self.batch.recorder()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.batch.block_runner().diagnostics()
    }

    /// @ai:intent Run a batch against the owned engine
    /// @ai:effects engine, fs:write
    pub async fn run(&mut self, step_limit: u64, commit: bool) -> Result<BatchOutcome> {
        self.batch.run_batch(&mut self.ctl, step_limit, commit).await
    }

    /// @ai:intent Run a batch that stops issuing blocks after `budget`
    /// @ai:effects engine, fs:write, time
    pub async fn run_within(
        &mut self,
        step_limit: u64,
        commit: bool,
        budget: Duration,
    ) -> Result<BatchOutcome> {
        self.batch
            .run_batch_within(&mut self.ctl, step_limit, commit, budget)
            .await
    }

    /// @ai:intent Run the configured benchmark workload for `rounds` rounds
    /// @ai:effects engine, fs:write, time
    pub async fn run_benchmark(&mut self, rounds: u32) -> Result<BenchmarkSummary> {
        self.benchmark
            .run_benchmark(&mut self.ctl, &mut self.batch, rounds)
            .await
    }

    /// @ai:intent Everything recorded so far, stamped with the current crank
    /// @ai:effects time
    pub fn report(&self) -> RunReport {
        self.recorder()
            .report(self.batch.block_size(), self.crank_number())
    }

    /// @ai:intent Close the engine and the store
    /// @ai:effects fs:write
    pub async fn close(&mut self) -> Result<()> {
        tracing::info!("Closing at crank {}", self.crank_number());
        self.ctl.close().await
    }
}
