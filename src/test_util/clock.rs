use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crate::util::clock::NanoClock;

/// A clock that only moves when told to
#[derive(Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}
impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.fetch_add(duration.as_nanos() as i64, Ordering::AcqRel);
    }
}
impl NanoClock for ManualClock {
    fn nano_time(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}
