//! A hashed timer wheel for the receiver's duty cycle.
//!
//! Timers are identified by [TimerHandle]s, which their owners create once and reuse. Time is
//!  divided into ticks of fixed duration; a timer is placed in the bucket of the first tick at or
//!  after its deadline, so it fires at most one tick late. Expired timers are collected into a
//!  caller-provided buffer rather than invoking callbacks, so the owner can dispatch them to the
//!  state they belong to without aliasing the wheel.
//!
//! The wheel is driven by polling [TimerWheel::expire_timers], there is no timer thread.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use anyhow::bail;
use rustc_hash::FxHashMap;
use tracing::trace;
use crate::util::clock::NanoClock;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// A new timer handle that is not scheduled. Handles are globally unique, so they can be
    ///  created independently of the wheel that later schedules them.
    pub fn new_blank() -> TimerHandle {
        TimerHandle(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The operations on timers needed by code that schedules timeouts
pub trait TimerFacility {
    /// (Re)schedule a timer to expire after `delay`, replacing a previous schedule if any
    fn reschedule_timeout(&mut self, delay: Duration, timer: TimerHandle);

    fn is_active(&self, timer: TimerHandle) -> bool;

    /// returns true if the timer was active
    fn cancel(&mut self, timer: TimerHandle) -> bool;
}

struct TimerEntry {
    deadline: i64,
    tick: u64,
}

pub struct TimerWheel {
    clock: Arc<dyn NanoClock>,
    start_time: i64,
    tick_duration_nanos: i64,
    mask: u64,
    current_tick: u64,
    wheel: Vec<Vec<TimerHandle>>,
    /// NB: every active timer is in exactly one bucket, and buckets contain only active timers
    active: FxHashMap<TimerHandle, TimerEntry>,
}

impl TimerWheel {
    pub fn new(clock: Arc<dyn NanoClock>, tick_duration: Duration, ticks_per_wheel: usize) -> anyhow::Result<TimerWheel> {
        if !ticks_per_wheel.is_power_of_two() {
            bail!("ticks per wheel must be a power of two, was {}", ticks_per_wheel);
        }
        let tick_duration_nanos = tick_duration.as_nanos() as i64;
        if tick_duration_nanos <= 0 {
            bail!("tick duration must be positive");
        }

        let start_time = clock.nano_time();
        Ok(TimerWheel {
            clock,
            start_time,
            tick_duration_nanos,
            mask: (ticks_per_wheel - 1) as u64,
            current_tick: 0,
            wheel: (0..ticks_per_wheel).map(|_| Vec::new()).collect(),
            active: FxHashMap::default(),
        })
    }

    pub fn clock(&self) -> &Arc<dyn NanoClock> {
        &self.clock
    }

    pub fn now(&self) -> i64 {
        self.clock.nano_time()
    }

    pub fn new_blank_timer(&self) -> TimerHandle {
        TimerHandle::new_blank()
    }

    pub fn num_active_timers(&self) -> usize {
        self.active.len()
    }

    fn remove_from_bucket(&mut self, timer: TimerHandle) {
        if let Some(entry) = self.active.get(&timer) {
            let slot = (entry.tick & self.mask) as usize;
            self.wheel[slot].retain(|h| *h != timer);
        }
    }

    fn tick_time(&self, tick: u64) -> i64 {
        self.start_time + tick as i64 * self.tick_duration_nanos
    }

    /// time until the next tick is due, in milliseconds
    pub fn compute_delay_in_ms(&self) -> i64 {
        let delay_nanos = self.tick_time(self.current_tick) - self.now();
        (delay_nanos / 1_000_000).max(0)
    }

    /// Expire all timers that are due, appending their handles to `expired`. Returns the number
    ///  of expired timers.
    pub fn expire_timers(&mut self, expired: &mut Vec<TimerHandle>) -> usize {
        let now = self.now();

        if self.active.is_empty() {
            // fast-forward: there is nothing to expire in the ticks that passed
            if self.tick_time(self.current_tick) <= now {
                let elapsed_ticks = ((now - self.start_time) / self.tick_duration_nanos) as u64;
                self.current_tick = elapsed_ticks + 1;
            }
            return 0;
        }

        let mut num_expired = 0;
        while self.tick_time(self.current_tick) <= now {
            let slot = (self.current_tick & self.mask) as usize;
            let bucket = mem::take(&mut self.wheel[slot]);

            for handle in bucket {
                match self.active.get(&handle) {
                    Some(entry) if entry.tick == self.current_tick => {
                        debug_assert!(entry.deadline <= now);
                        self.active.remove(&handle);
                        expired.push(handle);
                        num_expired += 1;
                    }
                    Some(_) => {
                        // scheduled for a later round of the wheel
                        self.wheel[slot].push(handle);
                    }
                    None => {
                        debug_assert!(false, "timer {:?} in bucket {} is not active", handle, slot);
                    }
                }
            }
            self.current_tick += 1;
        }

        if num_expired > 0 {
            trace!("expired {} timers", num_expired);
        }
        num_expired
    }
}

impl TimerFacility for TimerWheel {
    fn reschedule_timeout(&mut self, delay: Duration, timer: TimerHandle) {
        let deadline = self.now() + delay.as_nanos() as i64;

        let ticks_since_start = (deadline - self.start_time + self.tick_duration_nanos - 1) / self.tick_duration_nanos;
        let tick = (ticks_since_start.max(0) as u64).max(self.current_tick);

        self.remove_from_bucket(timer);
        self.active.insert(timer, TimerEntry { deadline, tick });
        self.wheel[(tick & self.mask) as usize].push(timer);
    }

    fn is_active(&self, timer: TimerHandle) -> bool {
        self.active.contains_key(&timer)
    }

    fn cancel(&mut self, timer: TimerHandle) -> bool {
        self.remove_from_bucket(timer);
        self.active.remove(&timer).is_some()
    }
}
