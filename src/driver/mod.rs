//! The receive side of the media driver: rebuilding terms from received frames, detecting loss
//!  and sending NAKs, and the receiver duty cycle that owns all of this state.

use std::sync::{Arc, Mutex};
use crossbeam::queue::ArrayQueue;
use tracing::info;
use crate::config::DriverConfig;
use crate::driver::receiver::Receiver;
use crate::driver::receiver_proxy::ReceiverProxy;
use crate::driver::system_counters::SystemCounters;
use crate::util::clock::NanoClock;

pub mod feedback_delay;
pub mod timer_wheel;
pub mod nak_sender;
pub mod system_counters;
pub mod loss_handler;
pub mod channel_endpoint;
pub mod driver_connection;
pub mod receiver_cmd;
pub mod receiver;
pub mod receiver_proxy;

/// Validate the configuration and create a receiver with its proxy. The caller runs the
///  receiver's duty cycle, typically by spawning [Receiver::do_loop].
pub fn new_receiver(config: &DriverConfig, clock: Arc<dyn NanoClock>, counters: SystemCounters) -> anyhow::Result<(Arc<Mutex<Receiver>>, ReceiverProxy)> {
    config.validate()?;

    let queue = Arc::new(ArrayQueue::new(config.command_queue_capacity));
    let receiver = Receiver::new(config, clock, queue.clone(), counters.clone())?;
    let receiver = Arc::new(Mutex::new(receiver));

    let proxy = ReceiverProxy::new(config.threading_mode, receiver.clone(), queue, counters.receiver_proxy_fails.clone());

    info!("created receiver in {:?} threading mode", config.threading_mode);
    Ok((receiver, proxy))
}
