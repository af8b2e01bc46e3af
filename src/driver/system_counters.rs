use std::sync::Arc;
use crate::util::atomic_counter::AtomicCounter;

/// Counters shared between the driver's components for monitoring. Cloning shares the
///  underlying counters.
#[derive(Clone, Debug, Default)]
pub struct SystemCounters {
    pub naks_sent: Arc<AtomicCounter>,
    pub naks_received: Arc<AtomicCounter>,
    pub receiver_proxy_fails: Arc<AtomicCounter>,
    pub invalid_frames: Arc<AtomicCounter>,
}

impl SystemCounters {
    pub fn new() -> SystemCounters {
        SystemCounters::default()
    }
}
