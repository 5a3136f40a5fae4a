//! @ai:module:intent Boundary to the opaque step-based engine being driven
//! @ai:module:layer domain
//! @ai:module:public_api Engine, EngineError, EngineStats, ResultStatus, CallPolicy, AuditReport, OutboundSink, QueueEngine, InboundPort

pub mod queue;

pub use queue::{InboundPort, QueueEngine};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Handle naming the eventual result of a queued external call.
pub type ResultId = u64;

/// Engine-reported counters, ordered by name so deltas print stably.
pub type EngineStats = BTreeMap<String, u64>;

/// @ai:intent Failures raised by the engine's own operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("step failed: {0}")]
    Step(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("restore failed: {0}")]
    Restore(String),

    #[error("engine is closed")]
    Closed,
}

/// @ai:intent Resolution state of a queued external call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Fulfilled,
    Rejected,
    Unknown,
}

impl ResultStatus {
    /// @ai:intent Whether the call has reached a final state
    /// @ai:effects pure
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResultStatus::Fulfilled | ResultStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Fulfilled => "fulfilled",
            ResultStatus::Rejected => "rejected",
            ResultStatus::Unknown => "unknown",
        }
    }
}

/// @ai:intent How the engine reports the terminal result of an external call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPolicy {
    None,
    #[default]
    Ignore,
    LogAlways,
    LogFailure,
}

/// @ai:intent Outcome of a reference-count consistency audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub checked: u64,
    pub violations: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// @ai:intent Receives outbound messages the engine emits for correlated inbound work
/// @ai:effects invoked from inside engine execution; must not fail into the engine
pub trait OutboundSink: Send + Sync {
    fn deliver_outbound(&self, tag: u64, value: Value);
}

/// @ai:intent Contract of the step-based engine driven by the runners
///
/// The engine is not reentrant: every method takes the single owner's borrow,
/// and `dump_state` / `audit_refcounts` take `&self` so diagnostics can only
/// observe.
#[allow(async_fn_in_trait)]
pub trait Engine: Send {
    /// @ai:intent Execute at most one unit of work
    /// @ai:post returns 0 exactly when the work queue is empty
    async fn step(&mut self) -> Result<u64, EngineError>;

    /// @ai:intent Produce the state snapshot to be persisted at a checkpoint
    async fn commit(&mut self) -> Result<Value, EngineError>;

    /// @ai:intent Release engine resources; further steps fail
    async fn close(&mut self) -> Result<(), EngineError>;

    /// @ai:intent Replace in-memory state with a persisted snapshot
    fn restore(&mut self, snapshot: &Value) -> Result<(), EngineError>;

    fn stats(&self) -> EngineStats;

    /// @ai:intent Enqueue a call to `target.method(args)` and return its result handle
    fn queue_external_call(
        &mut self,
        target: &str,
        method: &str,
        args: Value,
        policy: CallPolicy,
    ) -> Result<ResultId, EngineError>;

    fn result_status(&self, id: ResultId) -> ResultStatus;

    fn result_value(&self, id: ResultId) -> Option<Value>;

    /// @ai:intent Debug snapshot of engine internals
    /// @ai:effects pure
    fn dump_state(&self) -> Value;

    /// @ai:intent Check internal reference counts for consistency
    /// @ai:effects pure
    fn audit_refcounts(&self) -> AuditReport;

    /// @ai:intent Highest inbound tag held in (possibly restored) engine state
    ///
    /// A restored engine may still answer messages accepted before the
    /// restart, so new correlation ids must start above this.
    fn inbound_high_water(&self) -> u64 {
        0
    }
}
