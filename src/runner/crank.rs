//! @ai:module:intent Running total of executed units, persisted with each checkpoint
//! @ai:module:layer domain
//! @ai:module:public_api CrankCounter
//! @ai:module:stateless false

use crate::store::{HostStore, StoreError, CRANK_NUMBER_KEY};

/// @ai:intent Monotonic count of units executed; the durable copy is authoritative on restart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrankCounter {
    value: u64,
}

impl CrankCounter {
    pub fn new(value: u64) -> Self {
        Self { value }
    }

    /// @ai:intent Read the counter back from durable storage
    /// @ai:post absent key yields zero
    /// @ai:effects fs:read
    pub fn load<S: HostStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        match store.get(CRANK_NUMBER_KEY) {
            None => Ok(Self::default()),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Self::new)
                .map_err(|_| StoreError::InvalidValue {
                    key: CRANK_NUMBER_KEY.to_string(),
                    value: raw,
                }),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn advance(&mut self, units: u64) {
        self.value += units;
    }

    /// @ai:intent Stage the current value for the next store commit
    /// @ai:effects state:write
    pub fn stage<S: HostStore + ?Sized>(&self, store: &mut S) {
        store.set(CRANK_NUMBER_KEY, self.value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_missing_counter_starts_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(CrankCounter::load(&store).unwrap().value(), 0);
    }

    #[test]
    fn test_counter_round_trips_through_commit() {
        let mut store = MemoryStore::new();
        let mut crank = CrankCounter::default();
        crank.advance(42);
        crank.stage(&mut store);
        store.commit().unwrap();

        assert_eq!(CrankCounter::load(&store.reopen()).unwrap().value(), 42);
    }

    #[test]
    fn test_uncommitted_advance_is_not_durable() {
        let mut store = MemoryStore::new();
        let mut crank = CrankCounter::new(10);
        crank.stage(&mut store);
        store.commit().unwrap();

        crank.advance(5);
        crank.stage(&mut store);

        assert_eq!(CrankCounter::load(&store.reopen()).unwrap().value(), 10);
    }

    #[test]
    fn test_garbage_counter_is_reported() {
        let mut store = MemoryStore::new();
        store.set(CRANK_NUMBER_KEY, "many".to_string());
        assert!(matches!(
            CrankCounter::load(&store),
            Err(StoreError::InvalidValue { .. })
        ));
    }
}
