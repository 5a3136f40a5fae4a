//! @ai:module:intent Request/response correlation table for inbound messages
//! @ai:module:layer domain
//! @ai:module:public_api CorrelationId, CorrelationTable, PendingCall, ProtocolViolation
//! @ai:module:stateless false

use crate::engine::OutboundSink;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;

/// @ai:intent Process-unique tag linking an inbound message to its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// @ai:intent An outbound reply that matches no live correlation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("reply for unknown correlation {0}")]
    UnknownCorrelation(CorrelationId),

    #[error("duplicate reply for already resolved correlation {0}")]
    AlreadyResolved(CorrelationId),
}

struct TableState {
    next: u64,
    live: HashMap<CorrelationId, oneshot::Sender<Value>>,
    violations: u64,
}

/// @ai:intent Live map of correlation id to completion handle
///
/// Ids come from a counter starting at 1 and are never reused. An entry is
/// removed the moment it resolves, so a second reply for the same id finds
/// nothing and is reported.
pub struct CorrelationTable {
    state: Mutex<TableState>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                next: 1,
                live: HashMap::new(),
                violations: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// @ai:intent Never issue an id at or below `high`
    /// @ai:post the next registered id is greater than `high`
    /// @ai:effects state:write
    pub fn reserve_through(&self, high: u64) {
        let mut state = self.lock();
        state.next = state.next.max(high.saturating_add(1));
    }

    /// @ai:intent Allocate a fresh id and its pending completion
    /// @ai:post returned id is greater than every id issued before
    /// @ai:effects state:write
    pub fn register(&self) -> (CorrelationId, PendingCall) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        let id = CorrelationId(state.next);
        state.next += 1;
        state.live.insert(id, tx);

        (id, PendingCall { id, rx })
    }

    /// @ai:intent Complete the pending call for `id` with `value`, exactly once
    /// @ai:effects state:write
    pub fn resolve(&self, id: CorrelationId, value: Value) -> std::result::Result<(), ProtocolViolation> {
        let mut state = self.lock();

        let Some(tx) = state.live.remove(&id) else {
            state.violations += 1;
            return Err(if id.0 > 0 && id.0 < state.next {
                ProtocolViolation::AlreadyResolved(id)
            } else {
                ProtocolViolation::UnknownCorrelation(id)
            });
        };
        drop(state);

        // The waiter may have given up; the entry is settled either way.
        if tx.send(value).is_err() {
            tracing::debug!("Waiter for {} went away before its reply", id);
        }
        Ok(())
    }

    /// @ai:intent Forget a pending call whose message never reached the engine
    /// @ai:effects state:write
    pub fn cancel(&self, id: CorrelationId) -> bool {
        self.lock().live.remove(&id).is_some()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().live.len()
    }

    pub fn violations(&self) -> u64 {
        self.lock().violations
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundSink for CorrelationTable {
    fn deliver_outbound(&self, tag: u64, value: Value) {
        if let Err(violation) = self.resolve(CorrelationId(tag), value) {
            tracing::warn!("Discarding outbound reply: {}", violation);
        }
    }
}

/// @ai:intent Single-consumer side of one correlation
pub struct PendingCall {
    id: CorrelationId,
    rx: oneshot::Receiver<Value>,
}

impl PendingCall {
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// @ai:intent Wait for the reply
    /// @ai:post Err(Abandoned) when the entry was cancelled or the table dropped
    pub async fn wait(self) -> Result<Value> {
        self.rx.await.map_err(|_| Error::Abandoned(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_strictly_increase_and_are_not_reused() {
        let table = CorrelationTable::new();
        let (a, _pa) = table.register();
        table.resolve(a, json!(1)).unwrap();
        let (b, _pb) = table.register();
        let (c, _pc) = table.register();

        assert_eq!(a.get(), 1);
        assert!(a < b && b < c);
        assert_eq!(table.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_resolve_delivers_value_to_waiter() {
        let table = CorrelationTable::new();
        let (id, pending) = table.register();

        table.resolve(id, json!({"ok": true})).unwrap();
        assert_eq!(pending.wait().await.unwrap(), json!({"ok": true}));
        assert_eq!(table.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_second_resolution_is_a_violation_and_first_wins() {
        let table = CorrelationTable::new();
        let (id, pending) = table.register();

        table.resolve(id, json!("first")).unwrap();
        assert_eq!(
            table.resolve(id, json!("second")),
            Err(ProtocolViolation::AlreadyResolved(id))
        );
        assert_eq!(pending.wait().await.unwrap(), json!("first"));
        assert_eq!(table.violations(), 1);
    }

    #[test]
    fn test_reserved_ids_are_skipped_and_count_as_issued() {
        let table = CorrelationTable::new();
        table.reserve_through(6);
        table.reserve_through(2);

        let (id, _pending) = table.register();
        assert_eq!(id.get(), 7);
        assert_eq!(
            table.resolve(CorrelationId::from(6), json!("stale")),
            Err(ProtocolViolation::AlreadyResolved(CorrelationId::from(6)))
        );
    }

    #[test]
    fn test_never_issued_id_is_unknown() {
        let table = CorrelationTable::new();
        assert_eq!(
            table.resolve(CorrelationId::from(7), json!(null)),
            Err(ProtocolViolation::UnknownCorrelation(CorrelationId::from(7)))
        );
    }

    #[test]
    fn test_sink_swallows_violations() {
        let table = CorrelationTable::new();
        table.deliver_outbound(42, json!("stray"));
        assert_eq!(table.violations(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_call_is_abandoned() {
        let table = CorrelationTable::new();
        let (id, pending) = table.register();

        assert!(table.cancel(id));
        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, Error::Abandoned(abandoned) if abandoned == id));
        assert!(!table.cancel(id));
    }
}
