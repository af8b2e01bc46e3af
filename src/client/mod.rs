//! The subscriber side of a connection: reading rebuilt terms in order and reporting progress.

pub mod data_handler;
pub mod position_reporter;
pub mod log_buffers;
pub mod connection;
