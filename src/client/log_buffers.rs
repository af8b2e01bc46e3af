use std::sync::Arc;
use tracing::debug;
use crate::logbuffer::term_buffer::TermBuffer;
use crate::logbuffer::{check_term_length, PARTITION_COUNT};

/// The term buffers of a connection as seen by the client. Where the buffers come from (and how
///  they are released) is up to the implementation.
pub trait LogBuffers {
    fn term_buffers(&self) -> &[Arc<TermBuffer>; PARTITION_COUNT];

    /// Release the buffers. This is called exactly once, when the connection is closed.
    fn close(&mut self);
}

/// Log buffers shared in-process with the driver side, released by dropping the references
pub struct SharedLogBuffers {
    term_buffers: [Arc<TermBuffer>; PARTITION_COUNT],
}

impl SharedLogBuffers {
    pub fn new(term_buffers: [Arc<TermBuffer>; PARTITION_COUNT]) -> anyhow::Result<SharedLogBuffers> {
        let term_length = term_buffers[0].capacity();
        check_term_length(term_length)?;
        if term_buffers.iter().any(|b| b.capacity() != term_length) {
            anyhow::bail!("all term buffers must have the same length");
        }
        Ok(SharedLogBuffers { term_buffers })
    }
}

impl LogBuffers for SharedLogBuffers {
    fn term_buffers(&self) -> &[Arc<TermBuffer>; PARTITION_COUNT] {
        &self.term_buffers
    }

    fn close(&mut self) {
        debug!("releasing log buffers");
    }
}
