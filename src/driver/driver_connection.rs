use std::sync::Arc;
use anyhow::bail;
use tracing::{debug, trace};
use crate::config::DriverConfig;
use crate::driver::channel_endpoint::ReceiveChannelEndpoint;
use crate::driver::feedback_delay::DelayGenerator;
use crate::driver::loss_handler::LossHandler;
use crate::driver::nak_sender::NakMessageSender;
use crate::driver::system_counters::SystemCounters;
use crate::driver::timer_wheel::{TimerFacility, TimerHandle};
use crate::logbuffer::frame_descriptor::{align, FrameType, DATA_HEADER_LENGTH, FRAME_ALIGNMENT};
use crate::logbuffer::position::{next_partition_index, PositionCodec};
use crate::logbuffer::term_buffer::TermBuffer;
use crate::logbuffer::term_rebuilder::TermRebuilder;
use crate::logbuffer::PARTITION_COUNT;
use crate::protocol::DataHeader;
use crate::safe_converter::PrecheckedCast;

pub type DriverLossHandler = LossHandler<DelayGenerator, Box<dyn NakMessageSender>>;

/// The driver side of a connection: rebuilds the terms of a single session from received frames
///  and tracks gaps for it. Term buffers are shared with the client side's
///  [crate::client::connection::Connection], which reads them.
///
/// Data is accepted for the active term and the term after it; the active term rotates when it
///  is complete, and the partition for the term after the new active term is cleaned at that
///  point (it held the term before the previous one).
pub struct DriverConnection {
    correlation_id: i64,
    session_id: i32,
    stream_id: i32,
    codec: PositionCodec,
    rebuilders: [TermRebuilder; PARTITION_COUNT],
    active_index: usize,
    active_term_id: i32,
    hwm_position: i64,
    loss_handler: DriverLossHandler,
}

impl DriverConnection {
    /// Create a connection that joins the stream at `(active_term_id, initial_term_offset)`.
    ///  Data before the joining position is not expected and not NAK'ed.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        correlation_id: i64,
        session_id: i32,
        stream_id: i32,
        initial_term_id: i32,
        active_term_id: i32,
        initial_term_offset: usize,
        term_buffers: [Arc<TermBuffer>; PARTITION_COUNT],
        loss_handler: DriverLossHandler,
    ) -> DriverConnection {
        let term_length = term_buffers[0].capacity();
        assert!(term_buffers.iter().all(|b| b.capacity() == term_length), "term buffers must have the same capacity");

        let codec = PositionCodec::new(term_length, initial_term_id);
        let active_index = codec.partition_index(active_term_id);

        let mut rebuilders = term_buffers.map(TermRebuilder::new);
        rebuilders[active_index].set_tail(initial_term_offset);

        let hwm_position = codec.position(active_term_id, initial_term_offset.prechecked_cast());

        debug!("new connection #{}: session {}, stream {}, joining at term {} offset {}", correlation_id, session_id, stream_id, active_term_id, initial_term_offset);

        DriverConnection {
            correlation_id,
            session_id,
            stream_id,
            codec,
            rebuilders,
            active_index,
            active_term_id,
            hwm_position,
            loss_handler,
        }
    }

    /// Create a connection for a session received through `endpoint`. Its NAKs follow the
    ///  configured delay policy for the endpoint, go out through the endpoint's control sink and
    ///  are counted in `counters.naks_sent`.
    #[allow(clippy::too_many_arguments)]
    pub fn for_endpoint(
        config: &DriverConfig,
        endpoint: &ReceiveChannelEndpoint,
        counters: &SystemCounters,
        correlation_id: i64,
        session_id: i32,
        stream_id: i32,
        initial_term_id: i32,
        active_term_id: i32,
        initial_term_offset: usize,
        term_buffers: [Arc<TermBuffer>; PARTITION_COUNT],
    ) -> anyhow::Result<DriverConnection> {
        if term_buffers.iter().any(|b| b.capacity() != config.term_buffer_length) {
            bail!("term buffers must have the configured term length of {} bytes", config.term_buffer_length);
        }
        if initial_term_offset % FRAME_ALIGNMENT != 0 || initial_term_offset > config.term_buffer_length {
            bail!("invalid initial term offset {}", initial_term_offset);
        }

        let loss_handler = LossHandler::new(
            config.delay_generator(endpoint.is_multicast()),
            Box::new(endpoint.nak_sender(session_id, stream_id)) as Box<dyn NakMessageSender>,
            counters.naks_sent.clone(),
        );

        Ok(DriverConnection::new(correlation_id, session_id, stream_id, initial_term_id, active_term_id, initial_term_offset, term_buffers, loss_handler))
    }

    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    pub fn stream_id(&self) -> i32 {
        self.stream_id
    }

    pub fn active_term_id(&self) -> i32 {
        self.active_term_id
    }

    pub fn timer(&self) -> TimerHandle {
        self.loss_handler.timer()
    }

    /// the position up to which all data was received
    pub fn completed_position(&self) -> i64 {
        let tail = self.rebuilders[self.active_index].tail();
        self.codec.position(self.active_term_id, tail.prechecked_cast())
    }

    /// the highest position up to which data was received
    pub fn hwm_position(&self) -> i64 {
        self.hwm_position
    }

    /// Insert a received data or padding frame. Returns false if the frame was dropped because it
    ///  does not belong to the active term or the term after it, or because it does not fit
    ///  into the term.
    pub fn insert_packet(&mut self, header: &DataHeader, frame: &[u8]) -> bool {
        let term_length = self.codec.term_length();

        let partition = if header.term_id == self.active_term_id {
            self.active_index
        }
        else if header.term_id == self.active_term_id.wrapping_add(1) {
            next_partition_index(self.active_index)
        }
        else {
            trace!("dropping frame for term {} - active term is {}", header.term_id, self.active_term_id);
            return false;
        };

        if header.term_offset < 0 || header.frame_length < DATA_HEADER_LENGTH as i32 {
            trace!("dropping frame with offset {} and length {}", header.term_offset, header.frame_length);
            return false;
        }
        let term_offset: usize = header.term_offset.prechecked_cast();
        let frame_length: usize = header.frame_length.prechecked_cast();
        if term_offset % FRAME_ALIGNMENT != 0 || term_offset + frame_length > term_length {
            trace!("dropping frame at offset {} with length {}: does not fit the term", term_offset, frame_length);
            return false;
        }
        // padding frames are received as their header only
        let expected_len = match header.frame_type {
            FrameType::Pad => DataHeader::SERIALIZED_LEN,
            _ => frame_length,
        };
        if frame.len() != expected_len {
            trace!("dropping frame of length {} with frame length {} in its header", frame.len(), frame_length);
            return false;
        }

        self.rebuilders[partition].insert(term_offset, frame);

        let frame_end = (term_offset + align(frame_length, FRAME_ALIGNMENT)).min(term_length);
        let frame_end_position = self.codec.position(header.term_id, frame_end.prechecked_cast());
        self.hwm_position = self.hwm_position.max(frame_end_position);

        while self.rebuilders[self.active_index].is_complete() {
            self.rotate_term();
        }
        true
    }

    fn rotate_term(&mut self) {
        self.active_index = next_partition_index(self.active_index);
        self.active_term_id = self.active_term_id.wrapping_add(1);

        let to_clean = next_partition_index(self.active_index);
        self.rebuilders[to_clean].clean();

        debug!("connection #{}: rotated to term {} in partition {}", self.correlation_id, self.active_term_id, self.active_index);
    }

    /// Scan the active term for gaps, scheduling NAKs for them
    pub fn scan_for_gaps(&mut self, timers: &mut impl TimerFacility) -> usize {
        let completed_position = self.completed_position();
        let term_buffer = self.rebuilders[self.active_index].buffer();

        self.loss_handler.scan(
            timers,
            term_buffer,
            completed_position,
            self.hwm_position,
            self.codec.term_length_mask(),
            self.codec.position_bits_to_shift,
            self.codec.initial_term_id,
        )
    }

    pub fn on_nak(&mut self, timers: &mut impl TimerFacility, term_id: i32, term_offset: i32) {
        self.loss_handler.on_nak(timers, term_id, term_offset);
    }

    pub fn on_timer_expire(&mut self, timers: &mut impl TimerFacility) {
        self.loss_handler.on_timer_expire(timers);
    }

    /// Stop all activity of the connection. Term buffers are released when the client side drops
    ///  its references as well.
    pub fn close(mut self, timers: &mut impl TimerFacility) {
        self.loss_handler.cancel_timer(timers);
        debug!("closed connection #{} at position {} (hwm {})", self.correlation_id, self.completed_position(), self.hwm_position);
    }
}
