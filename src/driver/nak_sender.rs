use std::sync::Arc;
use bytes::{Bytes, BytesMut};
#[cfg(test)] use mockall::automock;
use tracing::{trace, warn};
use crate::protocol::NakHeader;

/// Sends a NAK for a gap of a single stream; the stream is implicit in the sender instance.
///
/// Sending is fire-and-forget: there is no acknowledgement, and a lost NAK is simply repeated
///  when the loss handler's timer expires the next time.
#[cfg_attr(test, automock)]
pub trait NakMessageSender: Send {
    fn send(&self, term_id: i32, term_offset: i32, length: i32);
}

impl<T: NakMessageSender + ?Sized> NakMessageSender for Box<T> {
    fn send(&self, term_id: i32, term_offset: i32, length: i32) {
        (**self).send(term_id, term_offset, length)
    }
}

/// The outbound channel for control frames (NAKs, status messages), i.e. the boundary to the
///  socket I/O layer
#[cfg_attr(test, automock)]
pub trait ControlFrameSink: Send + Sync {
    fn send_control_frame(&self, frame: Bytes);
}

impl<T: ControlFrameSink + ?Sized> ControlFrameSink for Arc<T> {
    fn send_control_frame(&self, frame: Bytes) {
        (**self).send_control_frame(frame)
    }
}

impl ControlFrameSink for tokio::sync::mpsc::UnboundedSender<Bytes> {
    fn send_control_frame(&self, frame: Bytes) {
        if self.send(frame).is_err() {
            warn!("control frame channel is closed - dropping frame");
        }
    }
}

/// Serializes NAK frames for one `(session id, stream id)` and hands them to a [ControlFrameSink]
pub struct NakFrameSender<S: ControlFrameSink> {
    session_id: i32,
    stream_id: i32,
    sink: S,
}

impl<S: ControlFrameSink> NakFrameSender<S> {
    pub fn new(session_id: i32, stream_id: i32, sink: S) -> NakFrameSender<S> {
        NakFrameSender {
            session_id,
            stream_id,
            sink,
        }
    }
}

impl<S: ControlFrameSink> NakMessageSender for NakFrameSender<S> {
    fn send(&self, term_id: i32, term_offset: i32, length: i32) {
        trace!("sending NAK for session {}, stream {}: term {}, offset {}, length {}", self.session_id, self.stream_id, term_id, term_offset, length);

        let mut buf = BytesMut::with_capacity(NakHeader::SERIALIZED_LEN);
        NakHeader {
            session_id: self.session_id,
            stream_id: self.stream_id,
            term_id,
            term_offset,
            length,
        }.ser(&mut buf);

        self.sink.send_control_frame(buf.freeze());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_nak_frame_sender() {
        let mut expected = BytesMut::new();
        NakHeader { session_id: 3, stream_id: 4, term_id: 9, term_offset: 128, length: 64 }.ser(&mut expected);
        let expected = expected.freeze();

        let mut sink = MockControlFrameSink::new();
        sink.expect_send_control_frame()
            .with(eq(expected))
            .once()
            .return_const(());

        let sender = NakFrameSender::new(3, 4, sink);
        sender.send(9, 128, 64);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Bytes>();

        let sender = NakFrameSender::new(1, 2, tx);
        sender.send(5, 0, 32);

        let frame = rx.recv().await.unwrap();
        let mut b: &[u8] = &frame;
        let nak = NakHeader::deser(&mut b).unwrap();
        assert_eq!(nak, NakHeader { session_id: 1, stream_id: 2, term_id: 5, term_offset: 0, length: 32 });
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Bytes>();
        drop(rx);

        NakFrameSender::new(1, 2, tx).send(5, 0, 32);
    }
}
