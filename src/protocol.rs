//! Serialization of the frame headers this crate produces or consumes. All numbers are little
//!  endian.
//!
//! NAK frame:
//!
//! ```ascii
//!  0: frame length (i32) - always 28
//!  4: version (u8)
//!  5: flags (u8) - unused, 0
//!  6: frame type (u16) - NAK
//!  8: session id (i32)
//! 12: stream id (i32)
//! 16: term id (i32) of the gap
//! 20: term offset (i32) of the gap
//! 24: length (i32) of the gap
//! ```

use anyhow::bail;
use bytes::{Buf, BufMut, BytesMut};
use crate::logbuffer::frame_descriptor::{FrameType, CURRENT_VERSION, DATA_HEADER_LENGTH, TYPE_OFFSET};

fn ensure_remaining(buf: &impl Buf, required: usize, what: &str) -> anyhow::Result<()> {
    if buf.remaining() < required {
        bail!("{} requires {} bytes, only {} remaining", what, required, buf.remaining());
    }
    Ok(())
}

/// The type of a raw frame, without parsing the rest of it
pub fn frame_type(frame: &[u8]) -> anyhow::Result<FrameType> {
    if frame.len() < TYPE_OFFSET + size_of::<u16>() {
        bail!("frame of length {} is too short to contain a frame type", frame.len());
    }
    let raw = u16::from_le_bytes([frame[TYPE_OFFSET], frame[TYPE_OFFSET + 1]]);
    Ok(FrameType::try_from(raw)?)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataHeader {
    pub frame_length: i32,
    pub version: u8,
    pub flags: u8,
    pub frame_type: FrameType,
    pub term_offset: i32,
    pub session_id: i32,
    pub stream_id: i32,
    pub term_id: i32,
}

impl DataHeader {
    pub const SERIALIZED_LEN: usize = DATA_HEADER_LENGTH;

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.frame_length);
        buf.put_u8(self.version);
        buf.put_u8(self.flags);
        buf.put_u16_le(self.frame_type.into());
        buf.put_i32_le(self.term_offset);
        buf.put_i32_le(self.session_id);
        buf.put_i32_le(self.stream_id);
        buf.put_i32_le(self.term_id);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<DataHeader> {
        ensure_remaining(buf, Self::SERIALIZED_LEN, "data header")?;

        let frame_length = buf.get_i32_le();
        let version = buf.get_u8();
        let flags = buf.get_u8();
        let frame_type = FrameType::try_from(buf.get_u16_le())?;
        let term_offset = buf.get_i32_le();
        let session_id = buf.get_i32_le();
        let stream_id = buf.get_i32_le();
        let term_id = buf.get_i32_le();

        if version != CURRENT_VERSION {
            bail!("unsupported frame version {}", version);
        }
        if frame_type != FrameType::Data && frame_type != FrameType::Pad {
            bail!("expected a data or padding frame, was {:?}", frame_type);
        }

        Ok(DataHeader {
            frame_length,
            version,
            flags,
            frame_type,
            term_offset,
            session_id,
            stream_id,
            term_id,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NakHeader {
    pub session_id: i32,
    pub stream_id: i32,
    pub term_id: i32,
    pub term_offset: i32,
    pub length: i32,
}

impl NakHeader {
    pub const SERIALIZED_LEN: usize = 28;

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_i32_le(Self::SERIALIZED_LEN as i32);
        buf.put_u8(CURRENT_VERSION);
        buf.put_u8(0);
        buf.put_u16_le(FrameType::Nak.into());
        buf.put_i32_le(self.session_id);
        buf.put_i32_le(self.stream_id);
        buf.put_i32_le(self.term_id);
        buf.put_i32_le(self.term_offset);
        buf.put_i32_le(self.length);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<NakHeader> {
        ensure_remaining(buf, Self::SERIALIZED_LEN, "NAK frame")?;

        let frame_length = buf.get_i32_le();
        let version = buf.get_u8();
        let _flags = buf.get_u8();
        let frame_type = FrameType::try_from(buf.get_u16_le())?;

        if frame_length != Self::SERIALIZED_LEN as i32 {
            bail!("NAK frame with unexpected frame length {}", frame_length);
        }
        if version != CURRENT_VERSION {
            bail!("unsupported frame version {}", version);
        }
        if frame_type != FrameType::Nak {
            bail!("expected a NAK frame, was {:?}", frame_type);
        }

        Ok(NakHeader {
            session_id: buf.get_i32_le(),
            stream_id: buf.get_i32_le(),
            term_id: buf.get_i32_le(),
            term_offset: buf.get_i32_le(),
            length: buf.get_i32_le(),
        })
    }
}
