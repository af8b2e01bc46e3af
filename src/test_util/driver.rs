use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use crate::driver::channel_endpoint::ReceiveChannelEndpoint;
use crate::driver::driver_connection::DriverConnection;
use crate::driver::feedback_delay::{DelayGenerator, StaticDelayGenerator};
use crate::driver::loss_handler::LossHandler;
use crate::driver::nak_sender::{ControlFrameSink, NakMessageSender};
use crate::logbuffer::term_buffer::TermBuffer;
use crate::logbuffer::{PARTITION_COUNT, TERM_MIN_LENGTH};
use crate::test_util::nak_sender::TrackingNakSender;
use crate::test_util::{SESSION_ID, STREAM_ID};
use crate::util::atomic_counter::AtomicCounter;

pub const CHANNEL: &str = "udp://localhost:40123";

/// NAK delay of connections created by [driver_connection]
pub const NAK_DELAY: Duration = Duration::from_millis(10);

static NEXT_CORRELATION_ID: AtomicI64 = AtomicI64::new(1);

struct DiscardingSink;
impl ControlFrameSink for DiscardingSink {
    fn send_control_frame(&self, _frame: Bytes) {
    }
}

pub fn test_endpoint() -> Arc<ReceiveChannelEndpoint> {
    Arc::new(ReceiveChannelEndpoint::new(CHANNEL, false, Arc::new(DiscardingSink)))
}

/// A connection for [SESSION_ID] and [STREAM_ID] starting at the beginning of term `term_id`,
///  with its NAKs going to `naks`
pub fn driver_connection(term_id: i32, naks: &TrackingNakSender) -> (DriverConnection, [Arc<TermBuffer>; PARTITION_COUNT]) {
    let term_buffers = [0, 1, 2].map(|_| Arc::new(TermBuffer::new(TERM_MIN_LENGTH).unwrap()));

    let loss_handler = LossHandler::new(
        DelayGenerator::Static(StaticDelayGenerator::new(NAK_DELAY, false)),
        Box::new(naks.clone()) as Box<dyn NakMessageSender>,
        Arc::new(AtomicCounter::new()),
    );

    let connection = DriverConnection::new(
        NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed),
        SESSION_ID,
        STREAM_ID,
        term_id,
        term_id,
        0,
        term_buffers.clone(),
        loss_handler,
    );
    (connection, term_buffers)
}
