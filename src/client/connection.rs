use tracing::{debug, trace};
use crate::client::data_handler::DataHandler;
use crate::client::log_buffers::LogBuffers;
use crate::client::position_reporter::PositionReporter;
use crate::logbuffer::position::{next_partition_index, PositionCodec};
use crate::logbuffer::term_reader::TermReader;
use crate::logbuffer::PARTITION_COUNT;
use crate::safe_converter::PrecheckedCast;

/// A subscriber's view of one publisher's stream. The connection reads the rebuilt terms in
///  order, rotating through the partitions, and reports its position after each poll that
///  delivered data.
///
/// NB: A connection is polled by a single thread; the position reporter is how other threads
///      learn about its progress.
pub struct Connection<H: DataHandler, P: PositionReporter, B: LogBuffers> {
    correlation_id: i64,
    session_id: i32,
    codec: PositionCodec,
    readers: [TermReader; PARTITION_COUNT],
    active_index: usize,
    active_term_id: i32,
    data_handler: H,
    position_reporter: P,
    log_buffers: B,
}

impl<H: DataHandler, P: PositionReporter, B: LogBuffers> Connection<H, P, B> {
    pub fn new(
        correlation_id: i64,
        session_id: i32,
        initial_term_id: i32,
        initial_position: i64,
        log_buffers: B,
        data_handler: H,
        position_reporter: P,
    ) -> Connection<H, P, B> {
        let term_buffers = log_buffers.term_buffers();
        let codec = PositionCodec::new(term_buffers[0].capacity(), initial_term_id);
        let mut readers = term_buffers.clone().map(TermReader::new);

        let active_term_id = codec.term_id(initial_position);
        let active_index = codec.partition_index(active_term_id);
        readers[active_index].seek(codec.term_offset(initial_position).prechecked_cast());

        debug!("new connection {} for session {} at position {} (term {})", correlation_id, session_id, initial_position, active_term_id);
        position_reporter.position(initial_position);

        Connection {
            correlation_id,
            session_id,
            codec,
            readers,
            active_index,
            active_term_id,
            data_handler,
            position_reporter,
            log_buffers,
        }
    }

    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    pub fn active_term_id(&self) -> i32 {
        self.active_term_id
    }

    /// the absolute position of the next frame to be read
    pub fn position(&self) -> i64 {
        let offset = self.readers[self.active_index].offset();
        self.codec.position(self.active_term_id, offset.prechecked_cast())
    }

    /// Deliver up to `fragment_limit` data frames to the data handler, returning the number of
    ///  frames delivered.
    pub fn poll(&mut self, fragment_limit: usize) -> usize {
        if self.readers[self.active_index].is_complete() {
            self.rotate_term();
        }

        let session_id = self.session_id;
        let data_handler = &mut self.data_handler;
        let num_read = self.readers[self.active_index].read(
            &mut |buffer, offset, length| data_handler.on_data(buffer, offset, length, session_id),
            fragment_limit,
        );

        if num_read > 0 {
            self.position_reporter.position(self.position());
        }
        num_read
    }

    fn rotate_term(&mut self) {
        self.active_index = next_partition_index(self.active_index);
        self.active_term_id = self.active_term_id.wrapping_add(1);
        self.readers[self.active_index].seek(0);
        trace!("connection {}: rotated to term {}", self.correlation_id, self.active_term_id);
    }

    /// Release the connection's log buffers
    pub fn close(mut self) {
        debug!("closing connection {} for session {}", self.correlation_id, self.session_id);
        self.log_buffers.close();
    }
}
