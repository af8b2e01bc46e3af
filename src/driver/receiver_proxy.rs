use std::sync::{Arc, Mutex};
use crossbeam::queue::ArrayQueue;
use tracing::{error, trace};
use crate::config::ThreadingMode;
use crate::driver::channel_endpoint::{DriverSubscription, ReceiveChannelEndpoint};
use crate::driver::driver_connection::DriverConnection;
use crate::driver::receiver::Receiver;
use crate::driver::receiver_cmd::ReceiverCmd;
use crate::util::atomic_counter::AtomicCounter;

enum ProxyStrategy {
    /// NB: The mutex is uncontended in shared threading mode, it is only there because the
    ///      receiver is reachable from the duty cycle and the proxy
    Inline(Arc<Mutex<Receiver>>),
    Queued {
        queue: Arc<ArrayQueue<ReceiverCmd>>,
        fail_count: Arc<AtomicCounter>,
    },
}

/// Hands commands over to the receiver: either by executing them right away (in shared threading
///  mode) or by offering them to the receiver's command queue.
///
/// Offering to a full queue spins until the receiver made room, counting each failed attempt.
///  Commands are never dropped, at the price of blocking the caller while the queue is full.
pub struct ReceiverProxy {
    strategy: ProxyStrategy,
}

impl ReceiverProxy {
    pub fn new(threading_mode: ThreadingMode, receiver: Arc<Mutex<Receiver>>, queue: Arc<ArrayQueue<ReceiverCmd>>, fail_count: Arc<AtomicCounter>) -> ReceiverProxy {
        let strategy = match threading_mode {
            ThreadingMode::Shared => ProxyStrategy::Inline(receiver),
            ThreadingMode::Dedicated => ProxyStrategy::Queued { queue, fail_count },
        };
        ReceiverProxy { strategy }
    }

    pub fn add_subscription(&self, endpoint: Arc<ReceiveChannelEndpoint>, stream_id: i32) {
        self.dispatch(ReceiverCmd::AddSubscription { endpoint, stream_id });
    }

    pub fn remove_subscription(&self, endpoint: Arc<ReceiveChannelEndpoint>, stream_id: i32) {
        self.dispatch(ReceiverCmd::RemoveSubscription { endpoint, stream_id });
    }

    pub fn new_connection(&self, endpoint: Arc<ReceiveChannelEndpoint>, connection: DriverConnection) {
        self.dispatch(ReceiverCmd::NewConnection { endpoint, connection: Box::new(connection) });
    }

    pub fn remove_connection(&self, endpoint: Arc<ReceiveChannelEndpoint>, session_id: i32, stream_id: i32) {
        self.dispatch(ReceiverCmd::RemoveConnection { endpoint, session_id, stream_id });
    }

    pub fn register_receive_channel_endpoint(&self, endpoint: Arc<ReceiveChannelEndpoint>) {
        self.dispatch(ReceiverCmd::RegisterReceiveChannelEndpoint { endpoint });
    }

    pub fn close_receive_channel_endpoint(&self, endpoint: Arc<ReceiveChannelEndpoint>) {
        self.dispatch(ReceiverCmd::CloseReceiveChannelEndpoint { endpoint });
    }

    pub fn remove_pending_setup(&self, endpoint: Arc<ReceiveChannelEndpoint>, session_id: i32, stream_id: i32) {
        self.dispatch(ReceiverCmd::RemovePendingSetup { endpoint, session_id, stream_id });
    }

    pub fn close_subscription(&self, subscription: DriverSubscription) {
        self.dispatch(ReceiverCmd::CloseSubscription { subscription });
    }

    fn dispatch(&self, cmd: ReceiverCmd) {
        match &self.strategy {
            ProxyStrategy::Inline(receiver) => {
                match receiver.lock() {
                    Ok(mut receiver) => cmd.execute(&mut receiver),
                    Err(_) => error!("receiver mutex is poisoned - dropping command"),
                }
            }
            ProxyStrategy::Queued { queue, fail_count } => {
                Self::offer(queue, fail_count, cmd);
            }
        }
    }

    fn offer(queue: &ArrayQueue<ReceiverCmd>, fail_count: &AtomicCounter, cmd: ReceiverCmd) {
        let mut cmd = cmd;
        while let Err(rejected) = queue.push(cmd) {
            fail_count.ordered_increment();
            trace!("receiver command queue is full - retrying");
            std::thread::yield_now();
            cmd = rejected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::DriverConfig;
    use crate::driver::system_counters::SystemCounters;
    use crate::test_util::clock::ManualClock;
    use crate::test_util::driver::{driver_connection, test_endpoint, CHANNEL};
    use crate::test_util::nak_sender::TrackingNakSender;
    use crate::test_util::{SESSION_ID, STREAM_ID};
    use rstest::rstest;

    struct Fixture {
        receiver: Arc<Mutex<Receiver>>,
        queue: Arc<ArrayQueue<ReceiverCmd>>,
        fail_count: Arc<AtomicCounter>,
        proxy: ReceiverProxy,
    }
    impl Fixture {
        fn new(threading_mode: ThreadingMode, queue_capacity: usize) -> Fixture {
            let queue = Arc::new(ArrayQueue::new(queue_capacity));
            let fail_count = Arc::new(AtomicCounter::new());
            let receiver = Receiver::new(&DriverConfig::default_unicast(), Arc::new(ManualClock::new()), queue.clone(), SystemCounters::new()).unwrap();
            let receiver = Arc::new(Mutex::new(receiver));
            let proxy = ReceiverProxy::new(threading_mode, receiver.clone(), queue.clone(), fail_count.clone());

            Fixture { receiver, queue, fail_count, proxy }
        }

        fn do_work(&self) -> usize {
            self.receiver.lock().unwrap().do_work()
        }
    }

    #[test]
    fn test_shared_mode_executes_inline() {
        let f = Fixture::new(ThreadingMode::Shared, 4);
        let endpoint = test_endpoint();

        f.proxy.register_receive_channel_endpoint(endpoint.clone());
        f.proxy.add_subscription(endpoint.clone(), STREAM_ID);

        assert!(f.queue.is_empty());
        let receiver = f.receiver.lock().unwrap();
        assert!(receiver.is_registered(CHANNEL));
        assert_eq!(receiver.subscription_count(CHANNEL, STREAM_ID), 1);
    }

    #[test]
    fn test_dedicated_mode_queues_commands() {
        let f = Fixture::new(ThreadingMode::Dedicated, 4);
        let endpoint = test_endpoint();

        f.proxy.register_receive_channel_endpoint(endpoint.clone());
        f.proxy.add_subscription(endpoint.clone(), STREAM_ID);

        assert_eq!(f.queue.len(), 2);
        assert!(!f.receiver.lock().unwrap().is_registered(CHANNEL));

        assert_eq!(f.do_work(), 2);
        assert_eq!(f.receiver.lock().unwrap().subscription_count(CHANNEL, STREAM_ID), 1);
        assert_eq!(f.fail_count.get(), 0);
    }

    #[rstest]
    #[case::shared(ThreadingMode::Shared)]
    #[case::dedicated(ThreadingMode::Dedicated)]
    fn test_all_operations(#[case] threading_mode: ThreadingMode) {
        let f = Fixture::new(threading_mode, 16);
        let endpoint = test_endpoint();
        let naks = TrackingNakSender::new();

        f.proxy.register_receive_channel_endpoint(endpoint.clone());
        f.proxy.add_subscription(endpoint.clone(), STREAM_ID);
        f.proxy.add_subscription(endpoint.clone(), STREAM_ID + 1);
        f.proxy.new_connection(endpoint.clone(), driver_connection(3, &naks).0);
        f.do_work();
        assert_eq!(f.receiver.lock().unwrap().num_connections(), 1);

        f.proxy.remove_connection(endpoint.clone(), SESSION_ID, STREAM_ID);
        f.proxy.remove_pending_setup(endpoint.clone(), SESSION_ID, STREAM_ID);
        f.proxy.remove_subscription(endpoint.clone(), STREAM_ID + 1);
        f.proxy.close_subscription(DriverSubscription { registration_id: 1, endpoint: endpoint.clone(), stream_id: STREAM_ID });
        f.do_work();
        {
            let receiver = f.receiver.lock().unwrap();
            assert_eq!(receiver.num_connections(), 0);
            assert_eq!(receiver.subscription_count(CHANNEL, STREAM_ID), 0);
            assert_eq!(receiver.subscription_count(CHANNEL, STREAM_ID + 1), 0);
        }

        f.proxy.close_receive_channel_endpoint(endpoint);
        f.do_work();
        assert!(!f.receiver.lock().unwrap().is_registered(CHANNEL));
    }

    #[test]
    fn test_full_queue_spins_until_offer_succeeds() {
        let f = Fixture::new(ThreadingMode::Dedicated, 1);
        let endpoint = test_endpoint();

        f.proxy.register_receive_channel_endpoint(endpoint.clone());
        assert!(f.queue.is_full());

        let queue = f.queue.clone();
        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            queue.pop().is_some()
        });

        f.proxy.add_subscription(endpoint, STREAM_ID);
        assert!(consumer.join().unwrap());

        assert!(f.fail_count.get() > 0);
        assert!(matches!(f.queue.pop(), Some(ReceiverCmd::AddSubscription { stream_id: STREAM_ID, .. })));
    }
}
