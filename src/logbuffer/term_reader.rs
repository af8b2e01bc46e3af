use std::sync::Arc;
use crate::logbuffer::frame_descriptor::{align, frame_length_volatile, is_padding_frame, DATA_HEADER_LENGTH, FRAME_ALIGNMENT};
use crate::logbuffer::term_buffer::TermBuffer;
use crate::safe_converter::PrecheckedCast;

/// A read cursor over a single term buffer, delivering complete frames in order.
pub struct TermReader {
    buffer: Arc<TermBuffer>,
    offset: usize,
}

impl TermReader {
    pub fn new(buffer: Arc<TermBuffer>) -> TermReader {
        TermReader {
            buffer,
            offset: 0,
        }
    }

    pub fn buffer(&self) -> &Arc<TermBuffer> {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// the offset of the next frame to be read
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, offset: usize) {
        assert!(offset <= self.capacity(), "seek to offset {} beyond capacity {}", offset, self.capacity());
        assert_eq!(offset % FRAME_ALIGNMENT, 0, "seek to unaligned offset {}", offset);
        self.offset = offset;
    }

    /// true if all frames up to the end of the term were consumed
    pub fn is_complete(&self) -> bool {
        self.offset >= self.capacity()
    }

    /// Read up to `fragment_limit` frames, passing `(buffer, payload offset, payload length)` of
    ///  each data frame to the handler. Padding frames are skipped without being counted.
    ///
    /// Returns the number of data frames read, which is 0 if no new data is available.
    pub fn read(&mut self, handler: &mut impl FnMut(&TermBuffer, usize, usize), fragment_limit: usize) -> usize {
        let mut num_fragments = 0;

        while num_fragments < fragment_limit && !self.is_complete() {
            let frame_offset = self.offset;
            let frame_length = frame_length_volatile(&self.buffer, frame_offset);
            if frame_length <= 0 {
                break;
            }

            let frame_length: usize = frame_length.prechecked_cast();
            self.offset += align(frame_length, FRAME_ALIGNMENT);

            if is_padding_frame(&self.buffer, frame_offset) {
                continue;
            }

            assert!(frame_length >= DATA_HEADER_LENGTH, "data frame at offset {} has length {} which is shorter than its header", frame_offset, frame_length);
            handler(self.buffer.as_ref(), frame_offset + DATA_HEADER_LENGTH, frame_length - DATA_HEADER_LENGTH);
            num_fragments += 1;
        }

        num_fragments
    }
}
