//! This crate is the reliable-delivery engine of a message transport that runs on top of an
//!  unreliable datagram network. Publishers append messages to a log made of fixed-capacity
//!  *term buffers*, subscribers read them back, and the receiving side detects and repairs gaps
//!  left by lost datagrams.
//!
//! ## Log buffers
//!
//! A stream is an unbounded sequence of bytes, addressed by a 64-bit *position*. It is mapped onto
//!  three equally sized buffers (*partitions*) that are used round-robin: each fill of a buffer is
//!  a *term*, identified by a 32-bit term id that increments on every rotation, starting from the
//!  stream's *initial term id*. Term capacity is a power of two, so
//!
//! ```ascii
//! term offset     = position & (capacity - 1)
//! term id         = initial term id + (position >>> log2(capacity))
//! partition index = (term id - initial term id) mod 3
//! ```
//!
//! Term ids wrap around, so all term id arithmetic is wrapping `i32` arithmetic relative to the
//!  initial term id.
//!
//! ## Frames
//!
//! A term buffer contains frames, each starting on an 8 byte boundary. All numbers are little
//!  endian:
//!
//! ```ascii
//!  0: frame length (i32) - including the header. Zero means 'not received yet'.
//!  4: version (u8)
//!  5: flags (u8)
//!  6: frame type (u16): PAD, DATA, NAK, SM
//!  8: term offset (i32)
//! 12: session id (i32)
//! 16: stream id (i32)
//! 20: term id (i32)
//! 24: payload
//! ```
//!
//! The frame length is written last (with release semantics) when a frame is inserted, so a
//!  reader observing a non-zero frame length sees the complete frame.
//!
//! ## Loss detection
//!
//! The receiver tracks two positions per connection: the *completed* position below which all
//!  data was received contiguously, and the *high-water mark* which is the highest position seen
//!  so far. Anything in between that was not received is a gap. The loss handler scans for the
//!  first gap and requests a re-send through a NAK after a (configurable) delay, repeating the NAK
//!  periodically until the gap is filled.
//!
//!  NB: Only one gap is NAK'ed at a time. Later gaps are picked up by subsequent scans once the
//!       earlier gap was repaired - this keeps the state machine simple, and if several gaps exist
//!       concurrently, the network is likely in trouble anyway
//!
//! NAKs from other receivers of the same (multicast) stream for the same gap suppress a receiver's
//!  own NAK, which avoids NAK storms.
//!
//! ## Threading
//!
//! Connections, loss handlers and the timer wheel are owned by a single receiver thread running a
//!  non-blocking duty cycle. Other threads talk to it through the [driver::receiver_proxy::ReceiverProxy]
//!  which either queues commands or - in shared threading mode - invokes them directly.

pub mod config;
pub mod safe_converter;
pub mod util;
pub mod logbuffer;
pub mod protocol;
pub mod driver;
pub mod client;

#[cfg(test)]
pub mod test_util;
