use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use crate::driver::nak_sender::{ControlFrameSink, NakFrameSender};

/// The receiving end of a channel (e.g. a UDP socket bound to a unicast address or joined to a
///  multicast group). Socket I/O happens elsewhere; the receiver only needs the channel's
///  identity and a way to send control frames back to the publishers.
pub struct ReceiveChannelEndpoint {
    channel: String,
    is_multicast: bool,
    control_sink: Arc<dyn ControlFrameSink>,
}

impl Debug for ReceiveChannelEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveChannelEndpoint")
            .field("channel", &self.channel)
            .field("is_multicast", &self.is_multicast)
            .finish()
    }
}

impl ReceiveChannelEndpoint {
    pub fn new(channel: impl Into<String>, is_multicast: bool, control_sink: Arc<dyn ControlFrameSink>) -> ReceiveChannelEndpoint {
        ReceiveChannelEndpoint {
            channel: channel.into(),
            is_multicast,
            control_sink,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_multicast(&self) -> bool {
        self.is_multicast
    }

    /// A NAK sender for a session received through this endpoint
    pub fn nak_sender(&self, session_id: i32, stream_id: i32) -> NakFrameSender<Arc<dyn ControlFrameSink>> {
        NakFrameSender::new(session_id, stream_id, self.control_sink.clone())
    }
}

/// A client subscription as seen by the driver
#[derive(Clone, Debug)]
pub struct DriverSubscription {
    pub registration_id: i64,
    pub endpoint: Arc<ReceiveChannelEndpoint>,
    pub stream_id: i32,
}
