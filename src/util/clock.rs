use tokio::time::Instant;

/// Monotonic time source in nanoseconds. The absolute value has no meaning, only differences
///  between readings do.
pub trait NanoClock: Send + Sync {
    fn nano_time(&self) -> i64;
}

/// [NanoClock] based on tokio's [Instant], i.e. it honors tokio's paused time in tests
pub struct TokioNanoClock {
    start: Instant,
}
impl Default for TokioNanoClock {
    fn default() -> Self {
        TokioNanoClock::new()
    }
}
impl TokioNanoClock {
    pub fn new() -> TokioNanoClock {
        TokioNanoClock {
            start: Instant::now(),
        }
    }
}
impl NanoClock for TokioNanoClock {
    fn nano_time(&self) -> i64 {
        // an i64 of nanos lasts for ~292 years of uptime
        self.start.elapsed().as_nanos() as i64
    }
}
