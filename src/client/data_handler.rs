use crate::logbuffer::term_buffer::TermBuffer;

/// Receives the payload of each data frame read by a connection. Implementations must not block,
///  and they may only read the buffer in the range `offset..offset+length`.
pub trait DataHandler {
    fn on_data(&mut self, buffer: &TermBuffer, offset: usize, length: usize, session_id: i32);
}

impl<F: FnMut(&TermBuffer, usize, usize, i32)> DataHandler for F {
    fn on_data(&mut self, buffer: &TermBuffer, offset: usize, length: usize, session_id: i32) {
        self(buffer, offset, length, session_id)
    }
}
