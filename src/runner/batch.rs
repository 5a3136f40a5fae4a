//! @ai:module:intent Repeat blocks until a step budget is spent or the engine drains
//! @ai:module:layer application
//! @ai:module:public_api BatchRunner, BatchOutcome
//! @ai:module:stateless false

use crate::clock::Clock;
use crate::engine::Engine;
use crate::error::Result;
use crate::metrics::{BatchRecord, StatsRecorder};
use crate::runner::block::{BlockRunner, Checkpoint};
use crate::runner::controller::Controller;
use crate::store::HostStore;
use std::sync::Arc;
use std::time::Duration;

/// @ai:intent Totals over one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub units: u64,
    pub blocks: u64,
    pub elapsed: Duration,
    /// The last block came back short
    pub drained: bool,
}

/// @ai:intent Drives blocks of `block_size` units
pub struct BatchRunner {
    block: BlockRunner,
    block_size: u64,
}

impl BatchRunner {
    /// @ai:pre block_size > 0
    pub fn new(block: BlockRunner, block_size: u64) -> Self {
        Self {
            block,
            block_size: block_size.max(1),
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn block_runner(&self) -> &BlockRunner {
        &self.block
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.block.clock()
    }

    pub fn recorder(&self) -> &StatsRecorder {
        self.block.stats()
    }

    pub fn recorder_mut(&mut self) -> &mut StatsRecorder {
        self.block.stats_mut()
    }

    /// @ai:intent Run blocks until `step_limit` units have run (0 = no limit) or the engine drains
    /// @ai:post units >= step_limit unless drained first
    /// @ai:post units < step_limit + block_size when step_limit > 0
    /// @ai:effects engine, fs:write
    ///
    /// A block is never cut short to honour the limit, so the total can
    /// overshoot it by up to `block_size - 1`. Only the first block of a
    /// batch checkpoints when it runs nothing.
    pub async fn run_batch<E: Engine, S: HostStore>(
        &mut self,
        ctl: &mut Controller<E, S>,
        step_limit: u64,
        commit: bool,
    ) -> Result<BatchOutcome> {
        self.drive(ctl, step_limit, commit, None).await
    }

    /// @ai:intent Like `run_batch`, but stop issuing blocks once `budget` has elapsed
    /// @ai:post a block in progress always runs to completion
    /// @ai:effects engine, fs:write, time
    pub async fn run_batch_within<E: Engine, S: HostStore>(
        &mut self,
        ctl: &mut Controller<E, S>,
        step_limit: u64,
        commit: bool,
        budget: Duration,
    ) -> Result<BatchOutcome> {
        self.drive(ctl, step_limit, commit, Some(budget)).await
    }

    async fn drive<E: Engine, S: HostStore>(
        &mut self,
        ctl: &mut Controller<E, S>,
        step_limit: u64,
        commit: bool,
        budget: Option<Duration>,
    ) -> Result<BatchOutcome> {
        let start = self.block.clock().now();
        let mut units = 0u64;
        let mut blocks = 0u64;
        let mut drained = false;

        loop {
            let checkpoint = match (commit, blocks) {
                (false, _) => Checkpoint::Skip,
                (true, 0) => Checkpoint::Always,
                (true, _) => Checkpoint::AfterProgress,
            };

            let outcome = self.block.execute(ctl, self.block_size, checkpoint).await?;
            units += outcome.units;
            blocks += 1;

            if outcome.units < self.block_size {
                drained = true;
                break;
            }
            if step_limit > 0 && units >= step_limit {
                break;
            }
            if let Some(budget) = budget {
                if self.block.clock().since(start) >= budget {
                    tracing::info!("Batch budget of {:?} spent after {} blocks", budget, blocks);
                    break;
                }
            }
        }

        let elapsed = self.block.clock().since(start);

        tracing::info!(
            "Batch ran {} units in {} blocks ({:.1}ms, crank {}{})",
            units,
            blocks,
            elapsed.as_secs_f64() * 1000.0,
            ctl.crank_number(),
            if drained { ", drained" } else { "" }
        );

        self.block.stats_mut().record_batch(BatchRecord {
            step_limit,
            units,
            blocks,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        });

        Ok(BatchOutcome {
            units,
            blocks,
            elapsed,
            drained,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{EngineConfig, StatsConfig};
    use crate::engine::{CallPolicy, QueueEngine};
    use crate::runner::diagnostics::Diagnostics;
    use crate::store::{MemoryStore, CRANK_NUMBER_KEY};
    use serde_json::json;

    /// Queue engine holding `k` single-unit calls.
    fn engine_with_units(k: u64) -> QueueEngine {
        let mut engine = QueueEngine::new(EngineConfig {
            call_cost: 1,
            ..Default::default()
        });
        for _ in 0..k {
            engine
                .queue_external_call("bootstrap", "tick", json!([]), CallPolicy::Ignore)
                .unwrap();
        }
        engine
    }

    fn batch_runner(block_size: u64, clock: Arc<dyn Clock>) -> BatchRunner {
        let stats = StatsConfig {
            log_blocks: true,
            ..Default::default()
        };
        let block = BlockRunner::new(
            clock,
            Diagnostics::default(),
            StatsRecorder::from_config(&stats),
        );
        BatchRunner::new(block, block_size)
    }

    fn runner(block_size: u64) -> BatchRunner {
        batch_runner(block_size, Arc::new(ManualClock::new()))
    }

    #[tokio::test]
    async fn test_450_units_commit_after_200_400_450() {
        let store = MemoryStore::new();
        let mut ctl = Controller::open(engine_with_units(450), store.reopen(), false).unwrap();
        let mut batch = runner(200);

        let outcome = batch.run_batch(&mut ctl, 0, true).await.unwrap();
        assert_eq!(outcome.units, 450);
        assert_eq!(outcome.blocks, 3);
        assert!(outcome.drained);
        assert_eq!(store.commit_count(), 3);

        let ends: Vec<u64> = batch
            .recorder()
            .blocks()
            .iter()
            .filter(|b| b.committed)
            .map(|b| b.crank_end)
            .collect();
        assert_eq!(ends, vec![200, 400, 450]);
        assert_eq!(store.committed_value(CRANK_NUMBER_KEY).as_deref(), Some("450"));
    }

    #[tokio::test]
    async fn test_drain_commits_ceil_k_over_block_size_times() {
        for (k, block_size) in [(1, 1), (7, 3), (9, 3), (10, 20), (400, 200)] {
            let store = MemoryStore::new();
            let mut ctl = Controller::open(engine_with_units(k), store.reopen(), false).unwrap();

            let outcome = runner(block_size)
                .run_batch(&mut ctl, 0, true)
                .await
                .unwrap();
            assert_eq!(outcome.units, k);
            assert_eq!(store.commit_count(), k.div_ceil(block_size), "k={}", k);
        }
    }

    #[tokio::test]
    async fn test_exact_multiple_probes_with_an_idle_block() {
        let store = MemoryStore::new();
        let mut ctl = Controller::open(engine_with_units(400), store.reopen(), false).unwrap();
        let mut batch = runner(200);

        let outcome = batch.run_batch(&mut ctl, 0, true).await.unwrap();
        assert_eq!(outcome.blocks, 3);
        assert_eq!(store.commit_count(), 2);

        let last = batch.recorder().blocks().last().unwrap();
        assert_eq!(last.units, 0);
        assert!(!last.committed);
    }

    #[tokio::test]
    async fn test_empty_engine_commits_once() {
        let store = MemoryStore::new();
        let mut ctl = Controller::open(engine_with_units(0), store.reopen(), false).unwrap();

        let outcome = runner(200).run_batch(&mut ctl, 0, true).await.unwrap();
        assert_eq!(outcome.units, 0);
        assert_eq!(outcome.blocks, 1);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.committed_value(CRANK_NUMBER_KEY).as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_step_limit_completes_the_block_in_progress() {
        for (limit, block_size) in [(1, 10), (15, 10), (20, 10), (29, 10)] {
            let mut ctl =
                Controller::open(engine_with_units(1000), MemoryStore::new(), false).unwrap();

            let outcome = runner(block_size)
                .run_batch(&mut ctl, limit, true)
                .await
                .unwrap();
            assert!(outcome.units >= limit, "limit={}", limit);
            assert!(outcome.units < limit + block_size, "limit={}", limit);
            assert!(!outcome.drained);
        }
    }

    #[tokio::test]
    async fn test_limit_below_block_size_runs_one_full_block() {
        let mut ctl = Controller::open(engine_with_units(50), MemoryStore::new(), false).unwrap();

        let outcome = runner(20).run_batch(&mut ctl, 5, false).await.unwrap();
        assert_eq!(outcome.units, 20);
        assert_eq!(outcome.blocks, 1);
    }

    #[tokio::test]
    async fn test_uncommitted_batch_leaves_store_untouched() {
        let store = MemoryStore::new();
        let mut ctl = Controller::open(engine_with_units(30), store.reopen(), false).unwrap();

        runner(10).run_batch(&mut ctl, 0, false).await.unwrap();
        assert_eq!(ctl.crank_number(), 30);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_restart_recovers_last_committed_crank() {
        let store = MemoryStore::new();
        let mut ctl = Controller::open(engine_with_units(45), store.reopen(), false).unwrap();
        let mut batch = runner(10);

        batch.run_batch(&mut ctl, 20, true).await.unwrap();
        batch.run_batch(&mut ctl, 10, false).await.unwrap();
        assert_eq!(ctl.crank_number(), 30);

        let reopened = Controller::open(
            QueueEngine::new(EngineConfig::default()),
            store.reopen(),
            false,
        )
        .unwrap();
        assert_eq!(reopened.crank_number(), 20);
        assert_eq!(reopened.engine().queue_len(), 25);
    }

    #[tokio::test]
    async fn test_budget_stops_issuing_blocks() {
        let clock = Arc::new(ManualClock::new());
        let mut batch = batch_runner(10, clock.clone());
        let mut ctl = Controller::open(engine_with_units(100), MemoryStore::new(), false).unwrap();

        clock.advance(Duration::from_secs(1));
        let outcome = batch
            .run_batch_within(&mut ctl, 0, true, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(outcome.blocks, 1);
        assert_eq!(outcome.units, 10);
    }

    #[tokio::test]
    async fn test_batches_are_recorded() {
        let mut ctl = Controller::open(engine_with_units(25), MemoryStore::new(), false).unwrap();
        let mut batch = runner(10);

        batch.run_batch(&mut ctl, 0, true).await.unwrap();

        let totals = batch.recorder().totals();
        assert_eq!(totals.units, 25);
        assert_eq!(totals.blocks, 3);
        assert_eq!(totals.batches, 1);
    }
}
