use std::sync::atomic::{AtomicI64, Ordering};

/// A counter for observability purposes, shared between threads. It is typically written by a
///  single thread and read by monitoring code, but concurrent increments are safe.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    pub fn new() -> AtomicCounter {
        AtomicCounter::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
    }

    /// increment without a full fence - the value is published with release semantics, which
    ///  is sufficient for a counter that is only read for reporting
    pub fn ordered_increment(&self) {
        self.value.fetch_add(1, Ordering::Release);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment() {
        let counter = AtomicCounter::new();
        assert_eq!(counter.get(), 0);

        counter.increment();
        counter.ordered_increment();
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_concurrent_increment() {
        let counter = Arc::new(AtomicCounter::new());

        let handles = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.ordered_increment();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get(), 4000);
    }
}
