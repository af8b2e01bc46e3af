//! The receiver owns all receive-side state of the driver: channel endpoints with their
//!  subscriptions, connections and their loss handlers, and the timer wheel driving NAKs. It is
//!  only ever touched by a single thread at a time; other threads talk to it through the
//!  [crate::driver::receiver_proxy::ReceiverProxy].

use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use crossbeam::queue::ArrayQueue;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use crate::config::DriverConfig;
use crate::driver::channel_endpoint::{DriverSubscription, ReceiveChannelEndpoint};
use crate::driver::driver_connection::DriverConnection;
use crate::driver::receiver_cmd::ReceiverCmd;
use crate::driver::system_counters::SystemCounters;
use crate::driver::timer_wheel::{TimerHandle, TimerWheel};
use crate::logbuffer::frame_descriptor::FrameType;
use crate::protocol::{frame_type, DataHeader, NakHeader};
use crate::util::clock::NanoClock;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct ConnectionKey {
    channel: String,
    session_id: i32,
    stream_id: i32,
}

struct EndpointState {
    endpoint: Arc<ReceiveChannelEndpoint>,
    /// reference count of subscriptions per stream id
    subscriptions: FxHashMap<i32, usize>,
    /// sessions for which data was received, but no connection exists yet: `(session id, stream id)`
    ///
    /// NB: Entries are removed when the connection is set up, when the stream's last subscription
    ///      goes away, or by an explicit `RemovePendingSetup`. The receiver does not expire them on
    ///      its own, so whoever sets up connections must remove setups that time out.
    pending_setups: FxHashSet<(i32, i32)>,
    connections: FxHashMap<(i32, i32), DriverConnection>,
}
impl EndpointState {
    fn new(endpoint: Arc<ReceiveChannelEndpoint>) -> EndpointState {
        EndpointState {
            endpoint,
            subscriptions: FxHashMap::default(),
            pending_setups: FxHashSet::default(),
            connections: FxHashMap::default(),
        }
    }
}

pub struct Receiver {
    timer_wheel: TimerWheel,
    command_queue: Arc<ArrayQueue<ReceiverCmd>>,
    endpoints: FxHashMap<String, EndpointState>,
    timer_owners: FxHashMap<TimerHandle, ConnectionKey>,
    counters: SystemCounters,
    expired_timers: Vec<TimerHandle>,
}

impl Receiver {
    pub fn new(config: &DriverConfig, clock: Arc<dyn NanoClock>, command_queue: Arc<ArrayQueue<ReceiverCmd>>, counters: SystemCounters) -> anyhow::Result<Receiver> {
        Ok(Receiver {
            timer_wheel: TimerWheel::new(clock, config.timer_tick, config.ticks_per_wheel)?,
            command_queue,
            endpoints: FxHashMap::default(),
            timer_owners: FxHashMap::default(),
            counters,
            expired_timers: Vec::new(),
        })
    }

    pub fn timer_wheel(&self) -> &TimerWheel {
        &self.timer_wheel
    }

    pub fn is_registered(&self, channel: &str) -> bool {
        self.endpoints.contains_key(channel)
    }

    pub fn subscription_count(&self, channel: &str, stream_id: i32) -> usize {
        self.endpoints.get(channel)
            .and_then(|e| e.subscriptions.get(&stream_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn has_pending_setup(&self, channel: &str, session_id: i32, stream_id: i32) -> bool {
        self.endpoints.get(channel)
            .map(|e| e.pending_setups.contains(&(session_id, stream_id)))
            .unwrap_or(false)
    }

    pub fn connection(&self, channel: &str, session_id: i32, stream_id: i32) -> Option<&DriverConnection> {
        self.endpoints.get(channel)
            .and_then(|e| e.connections.get(&(session_id, stream_id)))
    }

    pub fn num_connections(&self) -> usize {
        self.endpoints.values()
            .map(|e| e.connections.len())
            .sum()
    }

    pub fn on_register_receive_channel_endpoint(&mut self, endpoint: Arc<ReceiveChannelEndpoint>) {
        if self.endpoints.contains_key(endpoint.channel()) {
            debug!("endpoint {} is already registered", endpoint.channel());
            return;
        }
        info!("registered receive channel endpoint {}", endpoint.channel());
        self.endpoints.insert(endpoint.channel().to_string(), EndpointState::new(endpoint));
    }

    pub fn on_close_receive_channel_endpoint(&mut self, endpoint: &ReceiveChannelEndpoint) {
        let Some(state) = self.endpoints.remove(endpoint.channel()) else {
            debug!("closing endpoint {} which is not registered - ignoring", endpoint.channel());
            return;
        };

        let num_connections = state.connections.len();
        for (_, connection) in state.connections {
            self.timer_owners.remove(&connection.timer());
            connection.close(&mut self.timer_wheel);
        }
        info!("closed receive channel endpoint {:?} with {} connections", state.endpoint, num_connections);
    }

    pub fn on_add_subscription(&mut self, endpoint: &Arc<ReceiveChannelEndpoint>, stream_id: i32) {
        let state = self.endpoints.entry(endpoint.channel().to_string())
            .or_insert_with(|| {
                debug!("implicitly registering endpoint {} for subscription", endpoint.channel());
                EndpointState::new(endpoint.clone())
            });

        let count = state.subscriptions.entry(stream_id).or_default();
        *count += 1;
        debug!("added subscription for stream {} on {} - now {} subscriptions", stream_id, endpoint.channel(), count);
    }

    pub fn on_remove_subscription(&mut self, endpoint: &ReceiveChannelEndpoint, stream_id: i32) {
        let Some(state) = self.endpoints.get_mut(endpoint.channel()) else {
            debug!("removing subscription from unregistered endpoint {} - ignoring", endpoint.channel());
            return;
        };
        let Some(count) = state.subscriptions.get_mut(&stream_id) else {
            debug!("removing subscription for stream {} on {} which has no subscriptions - ignoring", stream_id, endpoint.channel());
            return;
        };

        *count -= 1;
        debug!("removed subscription for stream {} on {} - {} subscriptions left", stream_id, endpoint.channel(), count);
        if *count > 0 {
            return;
        }

        state.subscriptions.remove(&stream_id);
        state.pending_setups.retain(|&(_, s)| s != stream_id);

        let to_close = state.connections.keys()
            .filter(|(_, s)| *s == stream_id)
            .copied()
            .collect::<Vec<_>>();
        for key in to_close {
            if let Some(connection) = state.connections.remove(&key) {
                self.timer_owners.remove(&connection.timer());
                connection.close(&mut self.timer_wheel);
            }
        }
    }

    pub fn on_close_subscription(&mut self, subscription: &DriverSubscription) {
        debug!("closing subscription #{}", subscription.registration_id);
        self.on_remove_subscription(&subscription.endpoint, subscription.stream_id);
    }

    pub fn on_new_connection(&mut self, endpoint: &ReceiveChannelEndpoint, connection: DriverConnection) {
        let Some(state) = self.endpoints.get_mut(endpoint.channel()) else {
            warn!("new connection #{} for unregistered endpoint {} - closing it", connection.correlation_id(), endpoint.channel());
            connection.close(&mut self.timer_wheel);
            return;
        };

        let key = (connection.session_id(), connection.stream_id());
        if !state.subscriptions.contains_key(&key.1) {
            debug!("new connection #{} for stream {} without subscriptions - closing it", connection.correlation_id(), key.1);
            connection.close(&mut self.timer_wheel);
            return;
        }

        state.pending_setups.remove(&key);
        self.timer_owners.insert(connection.timer(), ConnectionKey {
            channel: endpoint.channel().to_string(),
            session_id: key.0,
            stream_id: key.1,
        });

        debug!("added connection #{} for session {}, stream {} on {}", connection.correlation_id(), key.0, key.1, endpoint.channel());
        if let Some(previous) = state.connections.insert(key, connection) {
            debug!("replaced connection #{}", previous.correlation_id());
            self.timer_owners.remove(&previous.timer());
            previous.close(&mut self.timer_wheel);
        }
    }

    pub fn on_remove_connection(&mut self, endpoint: &ReceiveChannelEndpoint, session_id: i32, stream_id: i32) {
        let removed = self.endpoints.get_mut(endpoint.channel())
            .and_then(|state| state.connections.remove(&(session_id, stream_id)));

        match removed {
            Some(connection) => {
                debug!("removed connection #{} for session {}, stream {}", connection.correlation_id(), session_id, stream_id);
                self.timer_owners.remove(&connection.timer());
                connection.close(&mut self.timer_wheel);
            }
            None => debug!("removing connection for session {}, stream {} on {} which does not exist - ignoring", session_id, stream_id, endpoint.channel()),
        }
    }

    pub fn on_remove_pending_setup(&mut self, endpoint: &ReceiveChannelEndpoint, session_id: i32, stream_id: i32) {
        if let Some(state) = self.endpoints.get_mut(endpoint.channel()) {
            if state.pending_setups.remove(&(session_id, stream_id)) {
                debug!("removed pending setup for session {}, stream {}", session_id, stream_id);
            }
        }
    }

    /// Dispatch a frame received on a channel by its type
    pub fn on_frame(&mut self, channel: &str, frame: &[u8]) {
        match frame_type(frame) {
            Ok(FrameType::Data) | Ok(FrameType::Pad) => self.on_data_frame(channel, frame),
            Ok(FrameType::Nak) => self.on_nak_frame(channel, frame),
            Ok(FrameType::Sm) => trace!("ignoring status message on receive channel {}", channel),
            Err(e) => {
                self.counters.invalid_frames.increment();
                warn!("received invalid frame on {}: {}", channel, e);
            }
        }
    }

    pub fn on_data_frame(&mut self, channel: &str, frame: &[u8]) {
        let mut buf = frame;
        let header = match DataHeader::deser(&mut buf) {
            Ok(header) => header,
            Err(e) => {
                self.counters.invalid_frames.increment();
                warn!("received invalid data frame on {}: {}", channel, e);
                return;
            }
        };

        let Some(state) = self.endpoints.get_mut(channel) else {
            trace!("data frame for unregistered channel {} - dropping", channel);
            return;
        };
        if !state.subscriptions.contains_key(&header.stream_id) {
            trace!("data frame for stream {} without subscriptions - dropping", header.stream_id);
            return;
        }

        let key = (header.session_id, header.stream_id);
        match state.connections.get_mut(&key) {
            Some(connection) => {
                connection.insert_packet(&header, frame);
            }
            None => {
                if state.pending_setups.insert(key) {
                    debug!("data from new session {} on stream {} on {} - awaiting connection setup", key.0, key.1, channel);
                }
            }
        }
    }

    /// A NAK sent by another receiver of the same stream (multicast), which may suppress our own
    pub fn on_nak_frame(&mut self, channel: &str, frame: &[u8]) {
        let mut buf = frame;
        let nak = match NakHeader::deser(&mut buf) {
            Ok(nak) => nak,
            Err(e) => {
                self.counters.invalid_frames.increment();
                warn!("received invalid NAK frame on {}: {}", channel, e);
                return;
            }
        };
        self.counters.naks_received.increment();

        let connection = self.endpoints.get_mut(channel)
            .and_then(|state| state.connections.get_mut(&(nak.session_id, nak.stream_id)));
        if let Some(connection) = connection {
            connection.on_nak(&mut self.timer_wheel, nak.term_id, nak.term_offset);
        }
    }

    /// One iteration of the receiver's duty cycle: process commands, scan all connections for gaps
    ///  and expire timers. Returns the amount of work done, 0 meaning the receiver is idle.
    pub fn do_work(&mut self) -> usize {
        let mut work_count = 0;

        while let Some(cmd) = self.command_queue.pop() {
            cmd.execute(self);
            work_count += 1;
        }

        // NB: scanning first cancels the timers of gaps that were repaired since the last cycle
        for state in self.endpoints.values_mut() {
            for connection in state.connections.values_mut() {
                work_count += connection.scan_for_gaps(&mut self.timer_wheel);
            }
        }

        let mut expired = mem::take(&mut self.expired_timers);
        work_count += self.timer_wheel.expire_timers(&mut expired);
        for timer in expired.drain(..) {
            let Some(key) = self.timer_owners.get(&timer) else {
                debug!("expired timer {:?} has no owner", timer);
                continue;
            };
            let connection = self.endpoints.get_mut(&key.channel)
                .and_then(|state| state.connections.get_mut(&(key.session_id, key.stream_id)));
            if let Some(connection) = connection {
                connection.on_timer_expire(&mut self.timer_wheel);
            }
        }
        self.expired_timers = expired;

        work_count
    }

    /// Active loop - this function never returns, it runs until its task is aborted
    pub async fn do_loop(receiver: Arc<Mutex<Receiver>>, idle_interval: Duration) {
        let mut idle = interval(idle_interval);
        idle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let work_count = match receiver.lock() {
                Ok(mut receiver) => receiver.do_work(),
                Err(_) => {
                    error!("receiver mutex is poisoned - stopping the receiver loop");
                    return;
                }
            };

            if work_count == 0 {
                idle.tick().await;
            }
            else {
                tokio::task::yield_now().await;
            }
        }
    }
}
