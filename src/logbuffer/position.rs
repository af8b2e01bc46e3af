//! Translation between a stream's linear position and `(term id, term offset, partition index)`.
//!
//! All functions are pure. Term ids wrap around at `i32::MAX`, so term ids are only ever
//!  compared or subtracted relative to the stream's initial term id using wrapping arithmetic.
//!  Positions are in the range `0 .. (2^31 << position_bits_to_shift)` - i.e. 2^31 terms after
//!  the initial term, which is more than enough for any stream's lifetime.

use crate::logbuffer::PARTITION_COUNT;
use crate::safe_converter::SafeCast;

/// `log2` of a (power-of-two) term length
pub fn position_bits_to_shift(term_length: usize) -> u32 {
    assert!(term_length.is_power_of_two(), "term length {} is not a power of two", term_length);
    term_length.trailing_zeros()
}

pub fn term_id_from_position(position: i64, position_bits_to_shift: u32, initial_term_id: i32) -> i32 {
    // logical shift: positions are non-negative, but a logical shift makes that irrelevant
    let term_count = ((position as u64) >> position_bits_to_shift) as i32;
    initial_term_id.wrapping_add(term_count)
}

pub fn term_offset_from_position(position: i64, position_bits_to_shift: u32) -> i32 {
    let mask = (1i64 << position_bits_to_shift) - 1;
    (position & mask) as i32
}

pub fn position_from_term_offset(term_id: i32, term_offset: i32, position_bits_to_shift: u32, initial_term_id: i32) -> i64 {
    let term_count: i64 = term_id.wrapping_sub(initial_term_id).safe_cast();
    (term_count << position_bits_to_shift) + term_offset.safe_cast()
}

/// The partition holding a given term. This is always in `0..PARTITION_COUNT`, also for term ids
///  that wrapped around relative to the initial term id.
pub fn partition_index(initial_term_id: i32, term_id: i32) -> usize {
    term_id.wrapping_sub(initial_term_id).rem_euclid(PARTITION_COUNT as i32) as usize
}

pub fn partition_index_from_position(position: i64, position_bits_to_shift: u32) -> usize {
    (((position as u64) >> position_bits_to_shift) % PARTITION_COUNT as u64) as usize
}

pub fn next_partition_index(current_index: usize) -> usize {
    (current_index + 1) % PARTITION_COUNT
}

pub fn previous_partition_index(current_index: usize) -> usize {
    (current_index + PARTITION_COUNT - 1) % PARTITION_COUNT
}

/// Bundles the per-stream parameters of the position functions
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PositionCodec {
    pub position_bits_to_shift: u32,
    pub initial_term_id: i32,
}

impl PositionCodec {
    pub fn new(term_length: usize, initial_term_id: i32) -> PositionCodec {
        PositionCodec {
            position_bits_to_shift: position_bits_to_shift(term_length),
            initial_term_id,
        }
    }

    pub fn term_length(&self) -> usize {
        1 << self.position_bits_to_shift
    }

    pub fn term_length_mask(&self) -> i32 {
        (self.term_length() - 1) as i32
    }

    pub fn term_id(&self, position: i64) -> i32 {
        term_id_from_position(position, self.position_bits_to_shift, self.initial_term_id)
    }

    pub fn term_offset(&self, position: i64) -> i32 {
        term_offset_from_position(position, self.position_bits_to_shift)
    }

    pub fn position(&self, term_id: i32, term_offset: i32) -> i64 {
        position_from_term_offset(term_id, term_offset, self.position_bits_to_shift, self.initial_term_id)
    }

    pub fn partition_index(&self, term_id: i32) -> usize {
        partition_index(self.initial_term_id, term_id)
    }
}
