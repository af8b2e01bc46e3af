use tracing::trace;
use crate::logbuffer::frame_descriptor::{aligned_frame_length, frame_length_volatile, FRAME_ALIGNMENT};
use crate::logbuffer::term_buffer::TermBuffer;

/// Scan a term buffer for gaps in the range `from_offset..to_offset`, walking the frames that are
///  present by their (aligned) frame length. A gap is a run of aligned offsets without a frame.
///
/// The handler is called with `(term_id, gap offset, gap length)` for each gap found, and it
///  returns whether scanning should continue.
///
/// Returns the number of gaps that were reported to the handler.
pub fn scan_for_gaps(
    buffer: &TermBuffer,
    term_id: i32,
    from_offset: usize,
    to_offset: usize,
    mut on_gap: impl FnMut(i32, usize, usize) -> bool,
) -> usize {
    let mut num_gaps = 0;
    let mut offset = from_offset;

    while offset < to_offset {
        let frame_length = aligned_frame_length(buffer, offset);
        if frame_length > 0 {
            offset += frame_length;
            continue;
        }

        let gap_begin = offset;
        offset = scan_gap(buffer, offset, to_offset);
        num_gaps += 1;

        trace!("gap in term {} at offset {} with length {}", term_id, gap_begin, offset - gap_begin);
        if !on_gap(term_id, gap_begin, offset - gap_begin) {
            break;
        }
    }

    num_gaps
}

/// returns the offset after the gap starting at `offset`, but at most `limit`
fn scan_gap(buffer: &TermBuffer, mut offset: usize, limit: usize) -> usize {
    offset += FRAME_ALIGNMENT;
    while offset < limit && frame_length_volatile(buffer, offset) == 0 {
        offset += FRAME_ALIGNMENT;
    }
    offset.min(limit)
}
