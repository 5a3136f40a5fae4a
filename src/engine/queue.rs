//! @ai:module:intent Deterministic in-process reference engine with a FIFO work queue
//! @ai:module:layer infrastructure
//! @ai:module:public_api QueueEngine, InboundPort
//! @ai:module:stateless false

use crate::config::EngineConfig;
use crate::engine::{
    AuditReport, CallPolicy, Engine, EngineError, EngineStats, OutboundSink, ResultId,
    ResultStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

const UNITS_EXECUTED: &str = "units_executed";
const CALLS_QUEUED: &str = "calls_queued";
const RESULTS_FULFILLED: &str = "results_fulfilled";
const RESULTS_REJECTED: &str = "results_rejected";
const MESSAGES_DELIVERED: &str = "messages_delivered";
const MESSAGES_ANSWERED: &str = "messages_answered";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WorkOrigin {
    Call {
        result: ResultId,
        target: String,
        method: String,
        args: Value,
        policy: CallPolicy,
    },
    Inbound {
        tag: u64,
        payload: Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkItem {
    origin: WorkOrigin,
    remaining: u64,
    executed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResultSlot {
    status: ResultStatus,
    value: Option<Value>,
}

/// Everything that survives a checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueState {
    queue: VecDeque<WorkItem>,
    results: BTreeMap<ResultId, ResultSlot>,
    next_result: ResultId,
    counters: BTreeMap<String, u64>,
    #[serde(default)]
    targets: BTreeSet<String>,
    /// Highest inbound tag ever absorbed into the queue
    #[serde(default)]
    inbound_high_water: u64,
}

impl QueueState {
    fn bump(&mut self, counter: &str) {
        *self.counters.entry(counter.to_string()).or_insert(0) += 1;
    }
}

/// @ai:intent Shared inbound channel; delivered messages are picked up on the next step
#[derive(Clone, Default)]
pub struct InboundPort {
    queue: Arc<Mutex<VecDeque<(u64, Value)>>>,
}

impl InboundPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// @ai:intent Queue a tagged inbound message for the engine
    /// @ai:effects state:write
    pub fn push(&self, tag: u64, payload: Value) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((tag, payload));
    }

    fn drain(&self) -> Vec<(u64, Value)> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// @ai:intent Round-robin work queue engine advancing one unit per step
///
/// External calls cost `call_cost` units and inbound messages `message_cost`
/// units. Unfinished items go to the back of the queue after each unit, so
/// concurrent work interleaves.
pub struct QueueEngine {
    state: QueueState,
    config: EngineConfig,
    port: InboundPort,
    sink: Option<Arc<dyn OutboundSink>>,
    closed: bool,
}

impl QueueEngine {
    /// @ai:intent Create an engine with the default `bootstrap` target registered
    /// @ai:effects pure
    pub fn new(config: EngineConfig) -> Self {
        let mut targets = BTreeSet::new();
        targets.insert("bootstrap".to_string());

        Self {
            state: QueueState {
                next_result: 1,
                targets,
                ..Default::default()
            },
            config,
            port: InboundPort::new(),
            sink: None,
            closed: false,
        }
    }

    /// @ai:intent Attach the receiver of outbound replies
    pub fn with_outbound(mut self, sink: Arc<dyn OutboundSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// @ai:intent Accept calls addressed to `target` from now on
    /// @ai:post the target survives checkpoint and restore
    /// @ai:effects state:write
    pub fn register_target(&mut self, target: &str) {
        self.state.targets.insert(target.to_string());
    }

    /// @ai:intent Handle for delivering inbound messages from outside
    pub fn inbound_port(&self) -> InboundPort {
        self.port.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.state.queue.len()
    }

    /// @ai:intent Move delivered inbound messages into the work queue
    /// @ai:effects state:write
    fn absorb_inbound(&mut self) {
        for (tag, payload) in self.port.drain() {
            self.state.bump(MESSAGES_DELIVERED);
            self.state.inbound_high_water = self.state.inbound_high_water.max(tag);
            self.state.queue.push_back(WorkItem {
                origin: WorkOrigin::Inbound { tag, payload },
                remaining: self.config.message_cost.max(1),
                executed: 0,
            });
        }
    }

    /// @ai:intent Settle a finished work item
    /// @ai:effects state:write
    fn complete(&mut self, item: WorkItem) {
        match item.origin {
            WorkOrigin::Call {
                result,
                target,
                method,
                args,
                policy,
            } => {
                let (status, value) = if self.state.targets.contains(&target) {
                    self.state.bump(RESULTS_FULFILLED);
                    (
                        ResultStatus::Fulfilled,
                        json!({
                            "target": target,
                            "method": method,
                            "args": args,
                            "units": item.executed,
                        }),
                    )
                } else {
                    self.state.bump(RESULTS_REJECTED);
                    (
                        ResultStatus::Rejected,
                        json!({ "error": format!("no such target: {}", target) }),
                    )
                };

                log_resolution(policy, result, status, &value);
                self.state.results.insert(
                    result,
                    ResultSlot {
                        status,
                        value: Some(value),
                    },
                );
            }
            WorkOrigin::Inbound { tag, payload } => {
                self.state.bump(MESSAGES_ANSWERED);
                let reply = json!({ "reply": payload, "units": item.executed });

                match &self.sink {
                    Some(sink) => sink.deliver_outbound(tag, reply),
                    None => tracing::warn!("No outbound sink attached; dropping reply for {}", tag),
                }
            }
        }
    }
}

/// @ai:intent Report a settled call according to its policy
/// @ai:effects io
fn log_resolution(policy: CallPolicy, id: ResultId, status: ResultStatus, value: &Value) {
    match policy {
        CallPolicy::LogAlways => {
            tracing::info!("Result r{} {}: {}", id, status.as_str(), value);
        }
        CallPolicy::LogFailure if status == ResultStatus::Rejected => {
            tracing::warn!("Result r{} rejected: {}", id, value);
        }
        _ => {}
    }
}

impl Engine for QueueEngine {
    async fn step(&mut self) -> Result<u64, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }

        self.absorb_inbound();

        let Some(mut item) = self.state.queue.pop_front() else {
            return Ok(0);
        };

        item.remaining -= 1;
        item.executed += 1;
        self.state.bump(UNITS_EXECUTED);

        if item.remaining > 0 {
            self.state.queue.push_back(item);
        } else {
            self.complete(item);
        }

        Ok(1)
    }

    async fn commit(&mut self) -> Result<Value, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        serde_json::to_value(&self.state).map_err(|e| EngineError::Commit(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.closed = true;
        Ok(())
    }

    fn restore(&mut self, snapshot: &Value) -> Result<(), EngineError> {
        let restored: QueueState = serde_json::from_value(snapshot.clone())
            .map_err(|e| EngineError::Restore(e.to_string()))?;
        let known = std::mem::replace(&mut self.state, restored);
        self.state.targets.extend(known.targets);
        Ok(())
    }

    fn inbound_high_water(&self) -> u64 {
        self.state.inbound_high_water
    }

    fn stats(&self) -> EngineStats {
        let mut stats = self.state.counters.clone();
        stats.insert("queue_length".to_string(), self.state.queue.len() as u64);
        stats.insert(
            "results_pending".to_string(),
            self.state
                .results
                .values()
                .filter(|slot| slot.status == ResultStatus::Pending)
                .count() as u64,
        );
        stats
    }

    fn queue_external_call(
        &mut self,
        target: &str,
        method: &str,
        args: Value,
        policy: CallPolicy,
    ) -> Result<ResultId, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }

        let result = self.state.next_result;
        self.state.next_result += 1;
        self.state.results.insert(
            result,
            ResultSlot {
                status: ResultStatus::Pending,
                value: None,
            },
        );
        self.state.queue.push_back(WorkItem {
            origin: WorkOrigin::Call {
                result,
                target: target.to_string(),
                method: method.to_string(),
                args,
                policy,
            },
            remaining: self.config.call_cost.max(1),
            executed: 0,
        });
        self.state.bump(CALLS_QUEUED);

        Ok(result)
    }

    fn result_status(&self, id: ResultId) -> ResultStatus {
        self.state
            .results
            .get(&id)
            .map(|slot| slot.status)
            .unwrap_or(ResultStatus::Unknown)
    }

    fn result_value(&self, id: ResultId) -> Option<Value> {
        self.state.results.get(&id).and_then(|slot| slot.value.clone())
    }

    fn dump_state(&self) -> Value {
        json!({
            "state": serde_json::to_value(&self.state).unwrap_or(Value::Null),
            "inbound_waiting": self.port.len(),
            "closed": self.closed,
        })
    }

    fn audit_refcounts(&self) -> AuditReport {
        let mut report = AuditReport::default();
        let mut refs: BTreeMap<ResultId, u64> = BTreeMap::new();

        for item in &self.state.queue {
            if let WorkOrigin::Call { result, .. } = &item.origin {
                report.checked += 1;
                *refs.entry(*result).or_insert(0) += 1;

                match self.state.results.get(result) {
                    Some(slot) if slot.status == ResultStatus::Pending => {}
                    Some(slot) => report.violations.push(format!(
                        "queued call references {} result r{}",
                        slot.status.as_str(),
                        result
                    )),
                    None => report
                        .violations
                        .push(format!("queued call references missing result r{}", result)),
                }
            }
        }

        for (id, slot) in &self.state.results {
            if slot.status != ResultStatus::Pending {
                continue;
            }
            report.checked += 1;
            let count = refs.get(id).copied().unwrap_or(0);
            if count != 1 {
                report.violations.push(format!(
                    "pending result r{} referenced {} times",
                    id, count
                ));
            }
        }

        report
    }
}
