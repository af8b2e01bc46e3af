use std::time::Duration;
use anyhow::bail;
use crate::driver::feedback_delay::{DelayGenerator, OptimalMulticastDelayGenerator, StaticDelayGenerator};
use crate::logbuffer::check_term_length;

/// How the receiver's duty cycle is scheduled relative to the threads that send it commands
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ThreadingMode {
    /// All driver work runs on a single thread, so commands are executed inline by the caller
    Shared,
    /// The receiver runs on its own thread (or task), commands are handed over through a queue
    Dedicated,
}

pub struct DriverConfig {
    /// Length of each of a stream's three term buffers. This must be a power of two between
    ///  64 KiB and 1 GiB.
    ///
    /// Longer terms mean fewer rotations, but the whole term set is allocated per connection.
    pub term_buffer_length: usize,

    /// Delay before a NAK is sent for a newly detected gap on a unicast channel, and the interval
    ///  for re-sending it while the gap persists
    pub nak_unicast_delay: Duration,
    /// Send a NAK right away when a gap is detected on a unicast channel, in addition to the
    ///  periodic NAKs
    pub nak_unicast_immediate: bool,

    /// Upper bound for the randomized NAK delay on multicast channels
    pub nak_multicast_max_backoff: Duration,
    /// Estimated number of receivers in a multicast group; this shapes the randomized NAK delay
    ///  so that typically only few receivers send a NAK for the same gap
    pub nak_multicast_group_size: u32,

    pub threading_mode: ThreadingMode,

    /// Capacity of the receiver's command queue. Offering to a full queue spins until there is
    ///  space, so this should be big enough for bursts of control traffic.
    pub command_queue_capacity: usize,

    pub timer_tick: Duration,
    /// must be a power of two
    pub ticks_per_wheel: usize,

    /// The receiver's duty cycle pauses for this interval when a cycle did no work
    pub receiver_idle_interval: Duration,
}

impl DriverConfig {
    pub fn default_unicast() -> DriverConfig {
        DriverConfig {
            term_buffer_length: 16 * 1024 * 1024,
            nak_unicast_delay: Duration::from_millis(60),
            nak_unicast_immediate: false,
            nak_multicast_max_backoff: Duration::from_millis(60),
            nak_multicast_group_size: 10,
            threading_mode: ThreadingMode::Dedicated,
            command_queue_capacity: 1024,
            timer_tick: Duration::from_millis(10),
            ticks_per_wheel: 1024,
            receiver_idle_interval: Duration::from_millis(1),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        check_term_length(self.term_buffer_length)?;

        if self.nak_unicast_delay.is_zero() {
            bail!("NAK delay must be positive");
        }
        if self.nak_multicast_max_backoff.is_zero() {
            bail!("multicast NAK backoff must be positive");
        }
        if self.nak_multicast_group_size == 0 {
            bail!("multicast group size must be at least 1");
        }
        if self.command_queue_capacity == 0 {
            bail!("command queue capacity must be positive");
        }
        if self.timer_tick.is_zero() {
            bail!("timer tick must be positive");
        }
        if !self.ticks_per_wheel.is_power_of_two() {
            bail!("ticks per wheel must be a power of two, was {}", self.ticks_per_wheel);
        }

        Ok(())
    }

    /// The NAK delay policy for a new connection
    pub fn delay_generator(&self, is_multicast: bool) -> DelayGenerator {
        if is_multicast {
            DelayGenerator::OptimalMulticast(OptimalMulticastDelayGenerator::new(self.nak_multicast_max_backoff, self.nak_multicast_group_size))
        }
        else {
            DelayGenerator::Static(StaticDelayGenerator::new(self.nak_unicast_delay, self.nak_unicast_immediate))
        }
    }
}
