//! @ai:module:intent Monotonic time sources for block and benchmark timing
//! @ai:module:layer infrastructure
//! @ai:module:public_api Clock, MonotonicClock, ManualClock

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// @ai:intent Monotonic time source, used only for measurements
pub trait Clock: Send + Sync {
    /// @ai:intent Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// @ai:intent Time elapsed since an earlier reading
    /// @ai:effects time
    fn since(&self, earlier: Duration) -> Duration {
        self.now().saturating_sub(earlier)
    }
}

/// @ai:intent Wall-independent clock backed by `std::time::Instant`
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// @ai:intent Hand-advanced clock for deterministic timing in tests
#[derive(Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// @ai:intent Move the clock forward
    /// @ai:effects state:write
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        // fetch_update only fails when the closure returns None
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
