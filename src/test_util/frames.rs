use crate::logbuffer::frame_descriptor::{align, FrameType, CURRENT_VERSION, DATA_HEADER_LENGTH, FRAME_ALIGNMENT, UNFRAGMENTED};
use crate::protocol::DataHeader;

pub const SESSION_ID: i32 = 0x5E55101D;
pub const STREAM_ID: i32 = 0xC400E;

/// The test payload length is chosen so that a frame does not end on a frame alignment boundary,
///  i.e. aligned frame length and frame length differ
pub const PAYLOAD_LENGTH: usize = 36;
pub const ALIGNED_FRAME_LENGTH: usize = 64;

const _: () = assert!(ALIGNED_FRAME_LENGTH == (DATA_HEADER_LENGTH + PAYLOAD_LENGTH + FRAME_ALIGNMENT - 1) / FRAME_ALIGNMENT * FRAME_ALIGNMENT);

pub fn data_header(term_id: i32, term_offset: usize, payload_len: usize) -> DataHeader {
    DataHeader {
        frame_length: (DATA_HEADER_LENGTH + payload_len) as i32,
        version: CURRENT_VERSION,
        flags: UNFRAGMENTED,
        frame_type: FrameType::Data,
        term_offset: term_offset as i32,
        session_id: SESSION_ID,
        stream_id: STREAM_ID,
        term_id,
    }
}

/// a complete data frame (header and payload) as it is received from the network
pub fn data_frame(term_id: i32, term_offset: usize, payload: &[u8]) -> Vec<u8> {
    let mut buf = bytes::BytesMut::new();
    data_header(term_id, term_offset, payload.len()).ser(&mut buf);
    buf.extend_from_slice(payload);
    buf.to_vec()
}

/// the header of a padding frame that fills the term from `term_offset` with `length` bytes
pub fn padding_frame(term_id: i32, term_offset: usize, length: usize) -> Vec<u8> {
    let mut header = data_header(term_id, term_offset, 0);
    header.frame_type = FrameType::Pad;
    header.frame_length = length as i32;

    let mut buf = bytes::BytesMut::new();
    header.ser(&mut buf);
    buf.to_vec()
}

pub fn offset_of_message(index: usize) -> usize {
    index * align(DATA_HEADER_LENGTH + PAYLOAD_LENGTH, FRAME_ALIGNMENT)
}
