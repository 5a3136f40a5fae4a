//! @ai:module:intent Single owner of the engine, the host store and the crank counter
//! @ai:module:layer application
//! @ai:module:public_api Controller
//! @ai:module:stateless false

use crate::engine::Engine;
use crate::error::Result;
use crate::runner::crank::CrankCounter;
use crate::store::{HostStore, CRANK_NUMBER_KEY, ENGINE_STATE_KEY};

/// @ai:intent Shared resources every runner borrows mutably, one at a time
pub struct Controller<E: Engine, S: HostStore> {
    pub(crate) engine: E,
    pub(crate) store: S,
    pub(crate) crank: CrankCounter,
}

impl<E: Engine, S: HostStore> Controller<E, S> {
    /// @ai:intent Adopt an engine and store, recovering durable state
    /// @ai:post crank equals the value of the last successful commit
    /// @ai:effects fs:read, fs:write
    pub fn open(mut engine: E, mut store: S, force_reset: bool) -> Result<Self> {
        if force_reset {
            store.delete(CRANK_NUMBER_KEY);
            store.delete(ENGINE_STATE_KEY);
            store.commit()?;
            tracing::info!("Persisted state reset");
        }

        let crank = CrankCounter::load(&store)?;

        if let Some(raw) = store.get(ENGINE_STATE_KEY) {
            let snapshot: serde_json::Value = serde_json::from_str(&raw)?;
            engine.restore(&snapshot)?;
            tracing::info!("Restored engine state at crank {}", crank.value());
        }

        Ok(Self {
            engine,
            store,
            crank,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn crank_number(&self) -> u64 {
        self.crank.value()
    }

    /// @ai:intent Persist engine snapshot and crank counter in one atomic commit
    /// @ai:post on error nothing from this checkpoint is durable
    /// @ai:effects fs:write
    pub async fn checkpoint(&mut self) -> Result<()> {
        let snapshot = self.engine.commit().await?;
        self.store
            .set(ENGINE_STATE_KEY, serde_json::to_string(&snapshot)?);
        self.crank.stage(&mut self.store);

        if let Err(err) = self.store.commit() {
            self.store.abort();
            return Err(err.into());
        }
        Ok(())
    }

    /// @ai:intent Close engine then store
    /// @ai:effects fs:write
    pub async fn close(&mut self) -> Result<()> {
        self.engine.close().await?;
        self.store.close()?;
        Ok(())
    }
}
