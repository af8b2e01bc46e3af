use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
#[cfg(test)] use mockall::automock;

/// Sink for a subscriber's progress. There is a single writer; readers (e.g. flow control in the
///  driver) may be on other threads.
#[cfg_attr(test, automock)]
pub trait PositionReporter {
    fn position(&self, position: i64);
}

/// A position shared through an atomic. Clones share the position.
#[derive(Clone, Debug, Default)]
pub struct AtomicPosition {
    value: Arc<AtomicI64>,
}

impl AtomicPosition {
    pub fn new() -> AtomicPosition {
        AtomicPosition::default()
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}

impl PositionReporter for AtomicPosition {
    fn position(&self, position: i64) {
        self.value.store(position, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_position_is_shared_between_clones() {
        let reporter = AtomicPosition::new();
        let reader = reporter.clone();
        assert_eq!(reader.get(), 0);

        reporter.position(4096);
        assert_eq!(reader.get(), 4096);
    }
}
