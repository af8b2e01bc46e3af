use std::sync::Arc;
use tracing::trace;
use crate::logbuffer::frame_descriptor::{aligned_frame_length, FRAME_ALIGNMENT, FRAME_LENGTH_OFFSET};
use crate::logbuffer::term_buffer::TermBuffer;

/// Rebuilds a term from frames that arrive in arbitrary order, and keeps track of the *tail*, i.e.
///  the offset up to which the term was received without gaps.
pub struct TermRebuilder {
    buffer: Arc<TermBuffer>,
    tail: usize,
}

impl TermRebuilder {
    pub fn new(buffer: Arc<TermBuffer>) -> TermRebuilder {
        TermRebuilder {
            buffer,
            tail: 0,
        }
    }

    pub fn buffer(&self) -> &Arc<TermBuffer> {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// the offset up to which the term is complete
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Set the tail explicitly, e.g. when joining a stream in the middle of a term: data before
    ///  the joining offset will never be received and must not be treated as missing
    pub fn set_tail(&mut self, tail: usize) {
        assert!(tail <= self.capacity());
        self.tail = tail;
    }

    pub fn is_complete(&self) -> bool {
        self.tail >= self.capacity()
    }

    /// Insert a frame (header included) at a given offset. The frame length is written last, so
    ///  concurrent readers never see a partially written frame.
    ///
    /// Inserting a frame twice (e.g. an original and a re-sent copy) is harmless.
    pub fn insert(&mut self, term_offset: usize, frame: &[u8]) {
        assert_eq!(term_offset % FRAME_ALIGNMENT, 0, "frame offset {} is not aligned", term_offset);
        assert!(frame.len() >= size_of::<i32>(), "frame of length {} does not contain a frame length", frame.len());

        let frame_length = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);

        let length_field_end = FRAME_LENGTH_OFFSET + size_of::<i32>();
        self.buffer.put_bytes(term_offset + length_field_end, &frame[length_field_end..]);
        self.buffer.put_i32_ordered(term_offset + FRAME_LENGTH_OFFSET, frame_length);

        trace!("inserted frame of length {} at offset {}", frame_length, term_offset);

        if term_offset == self.tail {
            self.advance_tail();
        }
    }

    fn advance_tail(&mut self) {
        while self.tail < self.capacity() {
            let length = aligned_frame_length(&self.buffer, self.tail);
            if length == 0 {
                break;
            }
            self.tail += length;
        }
    }

    /// zero the term so it can be reused for a later term
    pub fn clean(&mut self) {
        self.buffer.set_memory(0, self.capacity(), 0);
        self.tail = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logbuffer::TERM_MIN_LENGTH;
    use crate::test_util::{data_frame, padding_frame, ALIGNED_FRAME_LENGTH};

    fn rebuilder() -> TermRebuilder {
        TermRebuilder::new(Arc::new(TermBuffer::new(TERM_MIN_LENGTH).unwrap()))
    }

    #[test]
    fn test_insert_in_order_advances_tail() {
        let mut rebuilder = rebuilder();

        rebuilder.insert(0, &data_frame(5, 0, b"hello"));
        assert_eq!(rebuilder.tail(), 32);

        rebuilder.insert(32, &data_frame(5, 32, b"world"));
        assert_eq!(rebuilder.tail(), 64);
        assert!(!rebuilder.is_complete());
    }

    #[test]
    fn test_out_of_order_insert_fills_gap() {
        let mut rebuilder = rebuilder();

        rebuilder.insert(0, &data_frame(5, 0, &[0; 36]));
        rebuilder.insert(2 * ALIGNED_FRAME_LENGTH, &data_frame(5, 2 * ALIGNED_FRAME_LENGTH, &[0; 36]));
        assert_eq!(rebuilder.tail(), ALIGNED_FRAME_LENGTH);

        rebuilder.insert(ALIGNED_FRAME_LENGTH, &data_frame(5, ALIGNED_FRAME_LENGTH, &[0; 36]));
        assert_eq!(rebuilder.tail(), 3 * ALIGNED_FRAME_LENGTH);
    }

    #[test]
    fn test_duplicate_insert() {
        let mut rebuilder = rebuilder();

        rebuilder.insert(0, &data_frame(5, 0, &[0; 36]));
        rebuilder.insert(0, &data_frame(5, 0, &[0; 36]));
        assert_eq!(rebuilder.tail(), ALIGNED_FRAME_LENGTH);
    }

    #[test]
    fn test_padding_completes_term() {
        let mut rebuilder = rebuilder();

        rebuilder.insert(0, &data_frame(5, 0, &[0; 36]));
        rebuilder.insert(ALIGNED_FRAME_LENGTH, &padding_frame(5, ALIGNED_FRAME_LENGTH, TERM_MIN_LENGTH - ALIGNED_FRAME_LENGTH));

        assert!(rebuilder.is_complete());
    }

    #[test]
    fn test_clean() {
        let mut rebuilder = rebuilder();
        rebuilder.insert(0, &data_frame(5, 0, &[1; 36]));

        rebuilder.clean();
        assert_eq!(rebuilder.tail(), 0);
        assert_eq!(aligned_frame_length(rebuilder.buffer(), 0), 0);
    }

    #[test]
    fn test_set_tail() {
        let mut rebuilder = rebuilder();
        rebuilder.set_tail(2 * ALIGNED_FRAME_LENGTH);

        rebuilder.insert(2 * ALIGNED_FRAME_LENGTH, &data_frame(5, 2 * ALIGNED_FRAME_LENGTH, &[0; 36]));
        assert_eq!(rebuilder.tail(), 3 * ALIGNED_FRAME_LENGTH);
    }
}
