//! Detection of lost data and scheduling of NAKs for a single connection.
//!
//! The loss handler is driven by periodic scans of the active term, passing in the *completed*
//!  position (up to which everything was received) and the *high-water mark* (the highest
//!  position received so far). It tracks a single *active gap* at a time:
//!
//! * A newly detected gap replaces the active gap and (re)schedules the NAK timer. The NAK is sent
//!   when the timer expires, or right away if the delay policy asks for immediate feedback.
//! * While the gap persists, the timer fires periodically, re-sending the NAK.
//! * A NAK for the same gap received from someone else pushes the timer back, suppressing this
//!   handler's NAK.
//! * Once completed catches up with the high-water mark, the timer is cancelled.
//!
//! Only the first gap of a scan is tracked. Later gaps are found by later scans after the earlier
//!  gap was repaired.

use std::sync::Arc;
use tracing::{debug, trace};
use crate::driver::feedback_delay::FeedbackDelayGenerator;
use crate::driver::nak_sender::NakMessageSender;
use crate::driver::timer_wheel::{TimerFacility, TimerHandle};
use crate::logbuffer::gap_scanner::scan_for_gaps;
use crate::logbuffer::term_buffer::TermBuffer;
use crate::safe_converter::PrecheckedCast;
use crate::util::atomic_counter::AtomicCounter;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Gap {
    pub term_id: i32,
    pub term_offset: i32,
    pub length: i32,
}
impl Gap {
    /// NB: the length is not compared, so a gap that grows at its end is still the same gap
    fn matches(&self, term_id: i32, term_offset: i32) -> bool {
        self.term_id == term_id && self.term_offset == term_offset
    }
}

pub struct LossHandler<D: FeedbackDelayGenerator, S: NakMessageSender> {
    delay_generator: D,
    nak_message_sender: S,
    naks_sent: Arc<AtomicCounter>,
    timer: TimerHandle,
    scanned_gap: Gap,
    active_gap: Gap,
}

impl<D: FeedbackDelayGenerator, S: NakMessageSender> LossHandler<D, S> {
    pub fn new(delay_generator: D, nak_message_sender: S, naks_sent: Arc<AtomicCounter>) -> LossHandler<D, S> {
        LossHandler {
            delay_generator,
            nak_message_sender,
            naks_sent,
            timer: TimerHandle::new_blank(),
            scanned_gap: Gap::default(),
            active_gap: Gap::default(),
        }
    }

    /// The handle of this handler's NAK timer. The timer's owner calls
    ///  [LossHandler::on_timer_expire] when it expires.
    pub fn timer(&self) -> TimerHandle {
        self.timer
    }

    pub fn active_gap(&self) -> Gap {
        self.active_gap
    }

    /// Scan the term containing `completed_position` for gaps, activating the first gap found.
    ///
    /// Returns 1 if there is an outstanding gap at the edge of received data that is already
    ///  being tracked, so the caller may scan less eagerly, and 0 otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn scan(
        &mut self,
        timers: &mut impl TimerFacility,
        term_buffer: &TermBuffer,
        completed_position: i64,
        hwm_position: i64,
        term_length_mask: i32,
        position_bits_to_shift: u32,
        initial_term_id: i32,
    ) -> usize {
        if completed_position >= hwm_position {
            if timers.cancel(self.timer) {
                trace!("gap closed - cancelled NAK timer");
            }
            return 0;
        }

        let term_length_mask = term_length_mask as i64;
        let completed_offset = (completed_position & term_length_mask) as i32;
        let hwm_offset = (hwm_position & term_length_mask) as i32;
        let completed_terms = ((completed_position as u64) >> position_bits_to_shift) as i32;
        let hwm_terms = ((hwm_position as u64) >> position_bits_to_shift) as i32;

        let active_term_id = initial_term_id.wrapping_add(completed_terms);

        // data beyond the end of this term is in a later term, which is not scanned
        let scan_limit = if completed_terms == hwm_terms { hwm_offset } else { completed_offset };

        let mut scanned_gap = None;
        let num_gaps = scan_for_gaps(
            term_buffer,
            active_term_id,
            completed_offset.prechecked_cast(),
            scan_limit.prechecked_cast(),
            |term_id, offset, length| {
                scanned_gap = Some(Gap {
                    term_id,
                    term_offset: offset.prechecked_cast(),
                    length: length.prechecked_cast(),
                });
                false
            },
        );

        if let Some(gap) = scanned_gap {
            debug_assert_eq!(num_gaps, 1);
            self.scanned_gap = gap;
            if !timers.is_active(self.timer) || !self.scanned_gap.matches(self.active_gap.term_id, self.active_gap.term_offset) {
                self.activate_gap(timers, self.scanned_gap);
            }
            return 0;
        }

        if !timers.is_active(self.timer) || !self.active_gap.matches(active_term_id, completed_offset) {
            // NB: the edge gap can span into a later term, but only its start matters for matching
            let length = (hwm_position - completed_position) as i32;
            self.activate_gap(timers, Gap {
                term_id: active_term_id,
                term_offset: completed_offset,
                length,
            });
            return 0;
        }

        1
    }

    /// Called when a NAK from another receiver of the same stream is observed. If it is for the
    ///  active gap, this handler's own NAK is suppressed by pushing back the timer.
    pub fn on_nak(&mut self, timers: &mut impl TimerFacility, term_id: i32, term_offset: i32) {
        if timers.is_active(self.timer) && self.active_gap.matches(term_id, term_offset) {
            trace!("suppressing NAK for term {}, offset {}", term_id, term_offset);
            self.schedule_timer(timers);
        }
    }

    /// Sends the NAK for the active gap and schedules the next retransmission
    pub fn on_timer_expire(&mut self, timers: &mut impl TimerFacility) {
        self.send_nak();
        self.schedule_timer(timers);
    }

    pub fn cancel_timer(&mut self, timers: &mut impl TimerFacility) {
        timers.cancel(self.timer);
    }

    fn activate_gap(&mut self, timers: &mut impl TimerFacility, gap: Gap) {
        debug!("activating gap {:?}", gap);

        self.active_gap = gap;
        self.schedule_timer(timers);

        if self.delay_generator.should_feedback_immediately() {
            self.send_nak();
        }
    }

    fn send_nak(&mut self) {
        self.naks_sent.ordered_increment();
        self.nak_message_sender.send(self.active_gap.term_id, self.active_gap.term_offset, self.active_gap.length);
    }

    fn schedule_timer(&mut self, timers: &mut impl TimerFacility) {
        let delay = self.delay_generator.generate_delay();
        timers.reschedule_timeout(delay, self.timer);
    }
}
