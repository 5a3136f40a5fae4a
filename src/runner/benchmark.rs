//! @ai:module:intent Run repeated drained rounds of a benchmark workload and summarize them
//! @ai:module:layer application
//! @ai:module:public_api BenchmarkRunner
//! @ai:module:stateless false

use crate::config::BenchmarkConfig;
use crate::engine::{CallPolicy, Engine};
use crate::error::{Error, Result};
use crate::metrics::{BenchmarkSummary, BenchmarkWindow, RoundOutcome};
use crate::runner::batch::BatchRunner;
use crate::runner::controller::Controller;
use crate::store::HostStore;
use serde_json::json;

/// @ai:intent Posts one call per round and drains it before the next round
pub struct BenchmarkRunner {
    target: String,
    method: String,
    policy: CallPolicy,
}

impl BenchmarkRunner {
    pub fn new(target: &str, method: &str, policy: CallPolicy) -> Self {
        Self {
            target: target.to_string(),
            method: method.to_string(),
            policy,
        }
    }

    pub fn from_config(config: &BenchmarkConfig) -> Self {
        Self::new(&config.target, &config.method, config.policy)
    }

    /// @ai:intent Run `rounds` isolated rounds and record the window summary
    /// @ai:pre rounds > 0
    /// @ai:post summary spans exactly the crank range covered by the rounds
    /// @ai:effects engine, fs:write, time
    ///
    /// A round whose call is still pending after its drain is logged and
    /// counted as inconclusive; the benchmark carries on.
    pub async fn run_benchmark<E: Engine, S: HostStore>(
        &self,
        ctl: &mut Controller<E, S>,
        batch: &mut BatchRunner,
        rounds: u32,
    ) -> Result<BenchmarkSummary> {
        if rounds == 0 {
            return Err(Error::Configuration(
                "benchmark rounds must be greater than zero".to_string(),
            ));
        }

        let clock = batch.clock().clone();
        let stats_before = ctl.engine.stats();
        let crank_before = ctl.crank_number();
        let start = clock.now();
        let mut outcomes = Vec::with_capacity(rounds as usize);

        for round in 1..=rounds {
            let result =
                ctl.engine
                    .queue_external_call(&self.target, &self.method, json!([]), self.policy)?;
            let drained = batch.run_batch(ctl, 0, true).await?;

            let status = ctl.engine.result_status(result);
            let value = if status.is_terminal() {
                ctl.engine.result_value(result)
            } else {
                None
            };

            if status.is_terminal() {
                tracing::info!(
                    "Round {}/{}: {}.{} {} in {} units",
                    round,
                    rounds,
                    self.target,
                    self.method,
                    status.as_str(),
                    drained.units
                );
            } else {
                tracing::warn!(
                    "Round {}/{}: {}.{} did not finish ({})",
                    round,
                    rounds,
                    self.target,
                    self.method,
                    status.as_str()
                );
            }

            outcomes.push(RoundOutcome {
                round,
                result,
                status,
                value,
                units: drained.units,
                elapsed_ms: drained.elapsed.as_secs_f64() * 1000.0,
            });
        }

        let elapsed = clock.since(start);
        let window = BenchmarkWindow {
            rounds,
            crank_before,
            crank_after: ctl.crank_number(),
            stats_before,
            stats_after: ctl.engine.stats(),
        };
        let summary = window.summarize(elapsed, outcomes);

        tracing::info!(
            "Benchmark: {} rounds, {} units ({:.1} units/round, {:.2}ms/round)",
            summary.rounds,
            summary.total_units,
            summary.avg_units_per_round,
            summary.avg_ms_per_round
        );

        batch.recorder_mut().record_benchmark(summary.clone());
        Ok(summary)
    }
}
