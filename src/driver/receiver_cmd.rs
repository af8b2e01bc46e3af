use std::sync::Arc;
use crate::driver::channel_endpoint::{DriverSubscription, ReceiveChannelEndpoint};
use crate::driver::driver_connection::DriverConnection;
use crate::driver::receiver::Receiver;

/// A command for the receiver, created on the caller's thread and executed on the receiver's
///  thread. Commands are immutable values that own everything they carry.
pub enum ReceiverCmd {
    AddSubscription {
        endpoint: Arc<ReceiveChannelEndpoint>,
        stream_id: i32,
    },
    RemoveSubscription {
        endpoint: Arc<ReceiveChannelEndpoint>,
        stream_id: i32,
    },
    NewConnection {
        endpoint: Arc<ReceiveChannelEndpoint>,
        connection: Box<DriverConnection>,
    },
    RemoveConnection {
        endpoint: Arc<ReceiveChannelEndpoint>,
        session_id: i32,
        stream_id: i32,
    },
    RegisterReceiveChannelEndpoint {
        endpoint: Arc<ReceiveChannelEndpoint>,
    },
    CloseReceiveChannelEndpoint {
        endpoint: Arc<ReceiveChannelEndpoint>,
    },
    RemovePendingSetup {
        endpoint: Arc<ReceiveChannelEndpoint>,
        session_id: i32,
        stream_id: i32,
    },
    CloseSubscription {
        subscription: DriverSubscription,
    },
}

impl ReceiverCmd {
    pub fn execute(self, receiver: &mut Receiver) {
        use ReceiverCmd::*;

        match self {
            AddSubscription { endpoint, stream_id } => receiver.on_add_subscription(&endpoint, stream_id),
            RemoveSubscription { endpoint, stream_id } => receiver.on_remove_subscription(&endpoint, stream_id),
            NewConnection { endpoint, connection } => receiver.on_new_connection(&endpoint, *connection),
            RemoveConnection { endpoint, session_id, stream_id } => receiver.on_remove_connection(&endpoint, session_id, stream_id),
            RegisterReceiveChannelEndpoint { endpoint } => receiver.on_register_receive_channel_endpoint(endpoint),
            CloseReceiveChannelEndpoint { endpoint } => receiver.on_close_receive_channel_endpoint(&endpoint),
            RemovePendingSetup { endpoint, session_id, stream_id } => receiver.on_remove_pending_setup(&endpoint, session_id, stream_id),
            CloseSubscription { subscription } => receiver.on_close_subscription(&subscription),
        }
    }
}
