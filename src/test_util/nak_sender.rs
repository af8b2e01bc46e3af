use std::sync::{Arc, Mutex};
use crate::driver::nak_sender::NakMessageSender;

/// A NAK sender that records all NAKs for later verification. Clones share the record.
#[derive(Default, Clone, Debug)]
pub struct TrackingNakSender {
    tracker: Arc<Mutex<Vec<(i32, i32, i32)>>>,
}
impl TrackingNakSender {
    pub fn new() -> TrackingNakSender {
        TrackingNakSender::default()
    }

    /// all NAKs sent so far as `(term id, term offset, length)`, in the order they were sent
    pub fn naks(&self) -> Vec<(i32, i32, i32)> {
        self.tracker.lock().unwrap().clone()
    }

    pub fn count(&self, term_id: i32, term_offset: usize, length: usize) -> usize {
        self.naks().iter()
            .filter(|&&nak| nak == (term_id, term_offset as i32, length as i32))
            .count()
    }

    pub fn assert_no_naks(&self) {
        let naks = self.naks();
        assert!(naks.is_empty(), "expected no NAKs, but were: {:?}", naks);
    }
}
impl NakMessageSender for TrackingNakSender {
    fn send(&self, term_id: i32, term_offset: i32, length: i32) {
        self.tracker.lock().unwrap().push((term_id, term_offset, length));
    }
}
