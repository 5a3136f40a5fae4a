//! @ai:module:intent Deliver inbound messages to the engine and hand back their correlated replies
//! @ai:module:layer application
//! @ai:module:public_api MessageBridge, InboundDevice, CorrelationTable, CorrelationId, PendingCall, ProtocolViolation

pub mod correlation;

pub use correlation::{CorrelationId, CorrelationTable, PendingCall, ProtocolViolation};

use crate::engine::{Engine, InboundPort};
use crate::error::Result;
use crate::runner::Orchestrator;
use crate::store::HostStore;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// @ai:intent Injection point through which tagged messages enter the engine
pub trait InboundDevice: Send + Sync {
    fn deliver(&self, id: CorrelationId, payload: Value) -> Result<()>;
}

impl InboundDevice for InboundPort {
    fn deliver(&self, id: CorrelationId, payload: Value) -> Result<()> {
        self.push(id.get(), payload);
        Ok(())
    }
}

/// @ai:intent Turns one inbound message into one awaited reply
///
/// Any number of `handle` calls may be in flight; their drains serialize on
/// the orchestrator mutex so engine steps never interleave. The table must be
/// the engine's outbound sink for replies to reach their callers. Ids start
/// above any inbound tag the recovered engine still holds, so a reply to a
/// message accepted before a restart can never reach a new caller.
pub struct MessageBridge<E: Engine, S: HostStore> {
    orchestrator: Arc<Mutex<Orchestrator<E, S>>>,
    device: Arc<dyn InboundDevice>,
    table: Arc<CorrelationTable>,
}

impl<E: Engine, S: HostStore> Clone for MessageBridge<E, S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            device: Arc::clone(&self.device),
            table: Arc::clone(&self.table),
        }
    }
}

impl<E: Engine, S: HostStore> MessageBridge<E, S> {
    pub fn new(
        orchestrator: Orchestrator<E, S>,
        device: Arc<dyn InboundDevice>,
        table: Arc<CorrelationTable>,
    ) -> Self {
        let high_water = orchestrator.engine().inbound_high_water();
        if high_water > 0 {
            tracing::info!(
                "Recovered engine holds inbound tags up to {}; new ids start above it",
                high_water
            );
            table.reserve_through(high_water);
        }

        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            device,
            table,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Mutex<Orchestrator<E, S>>> {
        &self.orchestrator
    }

    pub fn table(&self) -> &CorrelationTable {
        &self.table
    }

    /// @ai:intent Deliver `payload`, drain the engine, and return the correlated reply
    /// @ai:post Ok value is the one the engine emitted for this call's id
    /// @ai:effects engine, fs:write
    ///
    /// Never returns if the engine never replies. A failed delivery or drain
    /// cancels the pending entry and returns the error.
    pub async fn handle(&self, payload: Value) -> Result<Value> {
        let (id, pending) = self.table.register();
        tracing::debug!("Accepted inbound message {}", id);

        if let Err(e) = self.device.deliver(id, payload) {
            self.table.cancel(id);
            return Err(e);
        }

        {
            let mut orchestrator = self.orchestrator.lock().await;
            if let Err(e) = orchestrator.run(0, true).await {
                self.table.cancel(id);
                return Err(e);
            }
        }

        let value = pending.wait().await?;
        tracing::debug!("Resolved inbound message {}", id);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, RunnerConfig};
    use crate::engine::{
        AuditReport, CallPolicy, EngineError, EngineStats, OutboundSink, QueueEngine, ResultId,
        ResultStatus,
    };
    use crate::error::Error;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    type Inbox = Arc<StdMutex<VecDeque<(u64, Value)>>>;

    struct InboxDevice(Inbox);

    impl InboundDevice for InboxDevice {
        fn deliver(&self, id: CorrelationId, payload: Value) -> Result<()> {
            self.0.lock().unwrap().push_back((id.get(), payload));
            Ok(())
        }
    }

    struct OfflineDevice;

    impl InboundDevice for OfflineDevice {
        fn deliver(&self, _id: CorrelationId, _payload: Value) -> Result<()> {
            Err(Error::Io(std::io::Error::other("device offline")))
        }
    }

    /// Echoes each inbound payload straight back in one unit.
    struct EchoEngine {
        inbox: Inbox,
        sink: Arc<CorrelationTable>,
        echoes: u32,
    }

    impl Engine for EchoEngine {
        async fn step(&mut self) -> std::result::Result<u64, EngineError> {
            let next = self.inbox.lock().unwrap().pop_front();
            let Some((tag, payload)) = next else {
                return Ok(0);
            };
            for _ in 0..self.echoes {
                self.sink.deliver_outbound(tag, json!({ "echo": payload }));
            }
            Ok(1)
        }

        async fn commit(&mut self) -> std::result::Result<Value, EngineError> {
            Ok(Value::Null)
        }

        async fn close(&mut self) -> std::result::Result<(), EngineError> {
            Ok(())
        }

        fn restore(&mut self, _snapshot: &Value) -> std::result::Result<(), EngineError> {
            Ok(())
        }

        fn stats(&self) -> EngineStats {
            EngineStats::new()
        }

        fn queue_external_call(
            &mut self,
            _target: &str,
            _method: &str,
            _args: Value,
            _policy: CallPolicy,
        ) -> std::result::Result<ResultId, EngineError> {
            Err(EngineError::Step("echo engine takes no calls".to_string()))
        }

        fn result_status(&self, _id: ResultId) -> ResultStatus {
            ResultStatus::Unknown
        }

        fn result_value(&self, _id: ResultId) -> Option<Value> {
            None
        }

        fn dump_state(&self) -> Value {
            Value::Null
        }

        fn audit_refcounts(&self) -> AuditReport {
            AuditReport::default()
        }
    }

    fn echo_bridge(echoes: u32) -> MessageBridge<EchoEngine, MemoryStore> {
        let table = Arc::new(CorrelationTable::new());
        let inbox: Inbox = Arc::default();
        let engine = EchoEngine {
            inbox: inbox.clone(),
            sink: table.clone(),
            echoes,
        };
        let orchestrator =
            Orchestrator::open(engine, MemoryStore::new(), &RunnerConfig::default()).unwrap();

        MessageBridge::new(orchestrator, Arc::new(InboxDevice(inbox)), table)
    }

    fn queue_bridge(block_size: u64) -> (MessageBridge<QueueEngine, MemoryStore>, MemoryStore) {
        let table = Arc::new(CorrelationTable::new());
        let engine = QueueEngine::new(EngineConfig {
            message_cost: 4,
            ..Default::default()
        })
        .with_outbound(table.clone());
        let port = engine.inbound_port();

        let store = MemoryStore::new();
        let mut config = RunnerConfig::default();
        config.run.block_size = block_size;
        let orchestrator = Orchestrator::open(engine, store.reopen(), &config).unwrap();

        let bridge = MessageBridge::new(orchestrator, Arc::new(port), table);
        (bridge, store)
    }

    #[tokio::test]
    async fn test_handle_returns_echoed_value() {
        let bridge = echo_bridge(1);

        let value = bridge.handle(json!("ping")).await.unwrap();
        assert_eq!(value, json!({ "echo": "ping" }));
        assert_eq!(bridge.table().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_reply_is_reported_and_discarded() {
        let bridge = echo_bridge(2);

        let value = bridge.handle(json!("once")).await.unwrap();
        assert_eq!(value, json!({ "echo": "once" }));
        assert_eq!(bridge.table().violations(), 1);

        let next = bridge.handle(json!("again")).await.unwrap();
        assert_eq!(next, json!({ "echo": "again" }));
        assert_eq!(bridge.table().violations(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_cancels_pending_entry() {
        let table = Arc::new(CorrelationTable::new());
        let engine = EchoEngine {
            inbox: Arc::default(),
            sink: table.clone(),
            echoes: 1,
        };
        let orchestrator =
            Orchestrator::open(engine, MemoryStore::new(), &RunnerConfig::default()).unwrap();
        let bridge = MessageBridge::new(orchestrator, Arc::new(OfflineDevice), table);

        let err = bridge.handle(json!("lost")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(bridge.table().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_drain_cancels_pending_entry() {
        let (bridge, store) = queue_bridge(10);
        bridge.orchestrator().lock().await.close().await.unwrap();

        let err = bridge.handle(json!("late")).await.unwrap_err();
        assert!(matches!(err, Error::Engine(EngineError::Closed)));
        assert_eq!(bridge.table().in_flight(), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_handles_get_their_own_replies() {
        let (bridge, store) = queue_bridge(3);

        let (a, b) = tokio::join!(
            bridge.handle(json!({ "from": "alice" })),
            bridge.handle(json!({ "from": "bob" }))
        );

        assert_eq!(a.unwrap()["reply"], json!({ "from": "alice" }));
        assert_eq!(b.unwrap()["reply"], json!({ "from": "bob" }));
        assert_eq!(bridge.table().in_flight(), 0);
        assert_eq!(bridge.table().violations(), 0);
        assert!(store.commit_count() >= 1);
        assert_eq!(bridge.orchestrator().lock().await.crank_number(), 8);
    }

    #[tokio::test]
    async fn test_interleaved_replies_are_not_swapped() {
        let table = Arc::new(CorrelationTable::new());
        let engine = QueueEngine::new(EngineConfig::default()).with_outbound(table.clone());
        let port = engine.inbound_port();
        let mut orchestrator =
            Orchestrator::open(engine, MemoryStore::new(), &RunnerConfig::default()).unwrap();

        let (first, first_pending) = table.register();
        let (second, second_pending) = table.register();
        port.deliver(first, json!("one")).unwrap();
        port.deliver(second, json!("two")).unwrap();

        let outcome = orchestrator.run(0, true).await.unwrap();
        assert_eq!(outcome.units, 4);

        assert_eq!(first_pending.wait().await.unwrap()["reply"], json!("one"));
        assert_eq!(second_pending.wait().await.unwrap()["reply"], json!("two"));
    }

    #[tokio::test]
    async fn test_restart_with_message_in_flight_keeps_replies_apart() {
        let store = MemoryStore::new();
        let mut config = RunnerConfig::default();
        config.run.block_size = 2;
        let engine_config = EngineConfig {
            message_cost: 4,
            ..Default::default()
        };

        {
            let table = Arc::new(CorrelationTable::new());
            let engine = QueueEngine::new(engine_config.clone()).with_outbound(table.clone());
            let port = engine.inbound_port();
            let mut orchestrator = Orchestrator::open(engine, store.reopen(), &config).unwrap();

            let (id, _pending) = table.register();
            assert_eq!(id.get(), 1);
            port.deliver(id, json!("old")).unwrap();

            let outcome = orchestrator.run(1, true).await.unwrap();
            assert_eq!(outcome.units, 2);
            assert_eq!(table.in_flight(), 1);
        }

        let table = Arc::new(CorrelationTable::new());
        let engine = QueueEngine::new(engine_config).with_outbound(table.clone());
        let port = engine.inbound_port();
        let orchestrator = Orchestrator::open(engine, store.reopen(), &config).unwrap();
        assert_eq!(orchestrator.crank_number(), 2);
        assert_eq!(orchestrator.engine().inbound_high_water(), 1);

        let bridge = MessageBridge::new(orchestrator, Arc::new(port), table);
        let reply = bridge.handle(json!("new")).await.unwrap();

        assert_eq!(reply["reply"], json!("new"));
        assert_eq!(bridge.table().violations(), 1);
        assert_eq!(bridge.table().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sequential_handles_use_increasing_ids() {
        let (bridge, _store) = queue_bridge(200);

        for i in 0..3 {
            let reply = bridge.handle(json!(i)).await.unwrap();
            assert_eq!(reply["reply"], json!(i));
        }

        let (next, _pending) = bridge.table().register();
        assert_eq!(next.get(), 4);
    }
}
