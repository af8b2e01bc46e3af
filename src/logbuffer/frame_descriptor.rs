//! Layout of the frames stored in a term buffer. See the crate documentation for the header
//!  diagram.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::logbuffer::term_buffer::TermBuffer;
use crate::safe_converter::PrecheckedCast;

/// All frames start on a multiple of this alignment
pub const FRAME_ALIGNMENT: usize = 8;

pub const FRAME_LENGTH_OFFSET: usize = 0;
pub const VERSION_OFFSET: usize = 4;
pub const FLAGS_OFFSET: usize = 5;
pub const TYPE_OFFSET: usize = 6;
pub const TERM_OFFSET_OFFSET: usize = 8;
pub const SESSION_ID_OFFSET: usize = 12;
pub const STREAM_ID_OFFSET: usize = 16;
pub const TERM_ID_OFFSET: usize = 20;

/// length of a data frame header, i.e. the offset of the payload inside a data frame
pub const DATA_HEADER_LENGTH: usize = 24;

pub const CURRENT_VERSION: u8 = 0;

pub const BEGIN_FRAGMENT_FLAG: u8 = 0x80;
pub const END_FRAGMENT_FLAG: u8 = 0x40;
pub const UNFRAGMENTED: u8 = BEGIN_FRAGMENT_FLAG | END_FRAGMENT_FLAG;

#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum FrameType {
    /// fills the remainder of a term that can not hold the next frame
    Pad = 0,
    Data = 1,
    Nak = 2,
    /// status message
    Sm = 3,
}

/// round `length` up to the next multiple of `alignment` (which must be a power of two)
pub fn align(length: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (length + alignment - 1) & !(alignment - 1)
}

/// The frame length at a given offset, with acquire semantics. Zero means that no frame was
///  written at this offset (yet).
pub fn frame_length_volatile(buffer: &TermBuffer, frame_offset: usize) -> i32 {
    buffer.get_i32_volatile(frame_offset + FRAME_LENGTH_OFFSET)
}

/// The aligned length of the frame at a given offset, or 0 if there is no frame
pub fn aligned_frame_length(buffer: &TermBuffer, frame_offset: usize) -> usize {
    let frame_length = frame_length_volatile(buffer, frame_offset);
    if frame_length <= 0 {
        return 0;
    }
    align(frame_length.prechecked_cast(), FRAME_ALIGNMENT)
}

pub fn is_padding_frame(buffer: &TermBuffer, frame_offset: usize) -> bool {
    buffer.get_u16(frame_offset + TYPE_OFFSET) == u16::from(FrameType::Pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 8)]
    #[case(8, 8)]
    #[case(60, 64)]
    #[case(64, 64)]
    #[case(65, 72)]
    fn test_align(#[case] length: usize, #[case] expected: usize) {
        assert_eq!(align(length, FRAME_ALIGNMENT), expected);
    }

    #[rstest]
    #[case(0, Some(FrameType::Pad))]
    #[case(1, Some(FrameType::Data))]
    #[case(2, Some(FrameType::Nak))]
    #[case(3, Some(FrameType::Sm))]
    #[case(4, None)]
    fn test_frame_type_from_raw(#[case] raw: u16, #[case] expected: Option<FrameType>) {
        assert_eq!(FrameType::try_from(raw).ok(), expected);
    }
}
