//! Utilities for testing: building frames and driver connections, a manually advanced clock, and
//!  a NAK sender that records what was sent.

pub mod frames;
pub mod clock;
pub mod nak_sender;
pub mod driver;

pub use frames::*;
