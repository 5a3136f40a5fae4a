//! @ai:module:intent Advance the engine by one bounded block of units
//! @ai:module:layer application
//! @ai:module:public_api BlockRunner, BlockOutcome
//! @ai:module:stateless false

use crate::clock::Clock;
use crate::engine::Engine;
use crate::error::Result;
use crate::metrics::{resident_memory_bytes, BlockRecord, StatsRecorder};
use crate::runner::controller::Controller;
use crate::runner::diagnostics::Diagnostics;
use crate::store::HostStore;
use std::sync::Arc;
use std::time::Duration;

/// @ai:intent What one block did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOutcome {
    pub units: u64,
    pub elapsed: Duration,
    pub committed: bool,
}

/// @ai:intent When a block checkpoints after its step loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Checkpoint {
    Skip,
    Always,
    /// Only when the block executed at least one unit
    AfterProgress,
}

impl Checkpoint {
    fn applies(self, units: u64) -> bool {
        match self {
            Checkpoint::Skip => false,
            Checkpoint::Always => true,
            Checkpoint::AfterProgress => units > 0,
        }
    }
}

/// @ai:intent Runs single blocks: step loop, optional checkpoint, diagnostics, stats
pub struct BlockRunner {
    clock: Arc<dyn Clock>,
    diagnostics: Diagnostics,
    stats: StatsRecorder,
    blocks_run: u64,
}

impl BlockRunner {
    pub fn new(clock: Arc<dyn Clock>, diagnostics: Diagnostics, stats: StatsRecorder) -> Self {
        Self {
            clock,
            diagnostics,
            stats,
            blocks_run: 0,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut StatsRecorder {
        &mut self.stats
    }

    pub fn blocks_run(&self) -> u64 {
        self.blocks_run
    }

    /// @ai:intent Step the engine up to `ceiling` units, then optionally checkpoint
    /// @ai:post returned units <= ceiling for engines that execute one unit per step
    /// @ai:post fewer units than ceiling means the engine drained
    /// @ai:effects engine, fs:write
    ///
    /// Engine and commit failures propagate unretried. A failed block leaves
    /// the durable state at the previous checkpoint.
    pub async fn run_block<E: Engine, S: HostStore>(
        &mut self,
        ctl: &mut Controller<E, S>,
        ceiling: u64,
        commit: bool,
    ) -> Result<BlockOutcome> {
        let checkpoint = if commit {
            Checkpoint::Always
        } else {
            Checkpoint::Skip
        };
        self.execute(ctl, ceiling, checkpoint).await
    }

    pub(crate) async fn execute<E: Engine, S: HostStore>(
        &mut self,
        ctl: &mut Controller<E, S>,
        ceiling: u64,
        checkpoint: Checkpoint,
    ) -> Result<BlockOutcome> {
        let start = self.clock.now();
        let crank_start = ctl.crank.value();
        let mut remaining = ceiling;
        let mut units = 0u64;

        while remaining > 0 {
            let executed = ctl.engine.step().await?;
            if executed == 0 {
                break;
            }

            units += executed;
            remaining = remaining.saturating_sub(executed);
            ctl.crank.advance(executed);
            self.diagnostics.after_crank(&ctl.engine, ctl.crank.value());
        }

        let commit = checkpoint.applies(units);
        if commit {
            ctl.checkpoint().await?;
        }

        self.diagnostics.after_block(&ctl.engine, ctl.crank.value());

        let elapsed = self.clock.since(start);
        self.blocks_run += 1;

        tracing::debug!(
            "Block {} ran {} of {} units (crank {} -> {}, committed={})",
            self.blocks_run,
            units,
            ceiling,
            crank_start,
            ctl.crank.value(),
            commit
        );

        if let Some(probe) = self.stats.block_probe() {
            let record = BlockRecord {
                block: self.blocks_run,
                crank_start,
                crank_end: ctl.crank.value(),
                ceiling,
                units,
                elapsed_ms: elapsed.as_secs_f64() * 1000.0,
                committed: commit,
                memory_bytes: if probe.memory { resident_memory_bytes() } else { None },
                disk_bytes: if probe.disk { ctl.store.disk_usage() } else { None },
                engine_stats: probe.engine_stats.then(|| ctl.engine.stats()),
            };
            self.stats.record_block(record);
        }

        Ok(BlockOutcome {
            units,
            elapsed,
            committed: commit,
        })
    }
}
