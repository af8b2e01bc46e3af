//! A fixed-capacity byte buffer holding one term of a stream.
//!
//! Term buffers are shared between a writer (the driver rebuilding the term from received
//!  packets) and readers (subscriber connections, loss detection). The protocol between them is
//!  the frame length field: a writer copies the rest of a frame first and publishes its frame
//!  length last with release semantics; a reader reads the frame length with acquire semantics
//!  and only touches the frame if it is non-zero. Everything else is plain memory access.
//!
//! The buffer is backed by `AtomicU64`s, which gives 8 byte alignment for all frame headers and
//!  interior mutability for shared (`Arc`) access.

use std::fmt::{Debug, Formatter};
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use crate::logbuffer::check_term_length;

pub struct TermBuffer {
    words: Box<[AtomicU64]>,
    capacity: usize,
}

impl Debug for TermBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TermBuffer{{capacity: {}}}", self.capacity)
    }
}

impl TermBuffer {
    /// Create a zero-filled term buffer, checking that the capacity is a valid term length
    pub fn new(capacity: usize) -> anyhow::Result<TermBuffer> {
        check_term_length(capacity)?;

        let words = (0..capacity / size_of::<u64>())
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(TermBuffer {
            words,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn base_ptr(&self) -> *mut u8 {
        // NB: writing through this pointer is legal because the memory is owned by atomics,
        //      i.e. it lives inside an UnsafeCell
        self.words.as_ptr() as *mut u8
    }

    fn bounds_check(&self, offset: usize, length: usize) {
        let end = offset.checked_add(length);
        assert!(end.is_some_and(|end| end <= self.capacity),
                "access of {} bytes at offset {} is out of bounds for a term buffer of capacity {}", length, offset, self.capacity);
    }

    fn atomic_i32(&self, offset: usize) -> &AtomicI32 {
        self.bounds_check(offset, size_of::<i32>());
        assert_eq!(offset % size_of::<i32>(), 0, "atomic access at unaligned offset {}", offset);

        // SAFETY: in bounds and aligned (checked above), and the memory is atomic-backed
        unsafe { AtomicI32::from_ptr(self.base_ptr().add(offset) as *mut i32) }
    }

    /// read an aligned i32 with acquire semantics
    pub fn get_i32_volatile(&self, offset: usize) -> i32 {
        i32::from_le(self.atomic_i32(offset).load(Ordering::Acquire))
    }

    /// write an aligned i32 with release semantics, publishing all previous writes
    pub fn put_i32_ordered(&self, offset: usize, value: i32) {
        self.atomic_i32(offset).store(value.to_le(), Ordering::Release);
    }

    pub fn get_i32(&self, offset: usize) -> i32 {
        let mut raw = [0u8; 4];
        self.get_bytes(offset, &mut raw);
        i32::from_le_bytes(raw)
    }

    pub fn put_i32(&self, offset: usize, value: i32) {
        self.put_bytes(offset, &value.to_le_bytes());
    }

    pub fn get_u16(&self, offset: usize) -> u16 {
        let mut raw = [0u8; 2];
        self.get_bytes(offset, &mut raw);
        u16::from_le_bytes(raw)
    }

    pub fn put_u16(&self, offset: usize, value: u16) {
        self.put_bytes(offset, &value.to_le_bytes());
    }

    pub fn get_u8(&self, offset: usize) -> u8 {
        let mut raw = [0u8; 1];
        self.get_bytes(offset, &mut raw);
        raw[0]
    }

    pub fn put_u8(&self, offset: usize, value: u8) {
        self.put_bytes(offset, &[value]);
    }

    pub fn put_bytes(&self, offset: usize, src: &[u8]) {
        self.bounds_check(offset, src.len());
        // SAFETY: in bounds (checked above); `src` can not overlap since it is borrowed
        //  immutably while the buffer's memory is only ever handed out as raw pointers
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.base_ptr().add(offset), src.len());
        }
    }

    pub fn get_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.bounds_check(offset, dst.len());
        // SAFETY: in bounds (checked above)
        unsafe {
            ptr::copy_nonoverlapping(self.base_ptr().add(offset), dst.as_mut_ptr(), dst.len());
        }
    }

    /// convenience for data handlers that want to take ownership of a message's payload
    pub fn to_vec(&self, offset: usize, length: usize) -> Vec<u8> {
        let mut result = vec![0; length];
        self.get_bytes(offset, &mut result);
        result
    }

    pub fn set_memory(&self, offset: usize, length: usize, value: u8) {
        self.bounds_check(offset, length);
        // SAFETY: in bounds (checked above)
        unsafe {
            ptr::write_bytes(self.base_ptr().add(offset), value, length);
        }
    }
}
