//! Layout and access of the log buffers that back a stream: the mapping between stream positions
//!  and term buffers, frame layout, and the primitives that write, read and scan term buffers.

use anyhow::bail;

pub mod position;
pub mod frame_descriptor;
pub mod term_buffer;
pub mod term_rebuilder;
pub mod term_reader;
pub mod gap_scanner;

/// The number of term buffers ('partitions') a stream rotates through. While one term is active,
///  the next one is clean and ready, and the previous one may still be read by slow readers.
pub const PARTITION_COUNT: usize = 3;

/// Minimum term buffer length, 64 KiB
pub const TERM_MIN_LENGTH: usize = 64 * 1024;

/// Maximum term buffer length, 1 GiB - this keeps all term offsets within positive `i32` range
pub const TERM_MAX_LENGTH: usize = 1024 * 1024 * 1024;

/// Check that a term length is usable: a power of two, between [TERM_MIN_LENGTH] and
///  [TERM_MAX_LENGTH]. This is checked once when a term buffer set is created, not on every
///  access.
pub fn check_term_length(term_length: usize) -> anyhow::Result<()> {
    if term_length < TERM_MIN_LENGTH {
        bail!("term length {} is less than the minimum of {}", term_length, TERM_MIN_LENGTH);
    }
    if term_length > TERM_MAX_LENGTH {
        bail!("term length {} is greater than the maximum of {}", term_length, TERM_MAX_LENGTH);
    }
    if !term_length.is_power_of_two() {
        bail!("term length {} is not a power of two", term_length);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::min(TERM_MIN_LENGTH, true)]
    #[case::max(TERM_MAX_LENGTH, true)]
    #[case::sixteen_megs(16 * 1024 * 1024, true)]
    #[case::too_small(TERM_MIN_LENGTH / 2, false)]
    #[case::too_big(TERM_MAX_LENGTH * 2, false)]
    #[case::not_power_of_two(TERM_MIN_LENGTH + 8, false)]
    fn test_check_term_length(#[case] term_length: usize, #[case] expected_ok: bool) {
        assert_eq!(check_term_length(term_length).is_ok(), expected_ok);
    }
}
