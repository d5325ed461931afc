//! Numeric limits and fixed codes for the fault subsystem.
//!
//! Single source of truth for buffer capacities and reserved codes.

use static_assertions::const_assert;

/// Capacity of a rendered error message (bytes).
pub const ERROR_MESSAGE_CAPACITY: usize = 1024;

/// Capacity of a single log line written from handler context (bytes).
pub const LOG_LINE_CAPACITY: usize = 512;

/// Capacity of an OS-supplied error message embedded in a rendered error (bytes).
pub const SYSTEM_MESSAGE_CAPACITY: usize = 256;

/// Top bit of an error code: the code is a platform status value (rendered in hex).
pub const CODE_STATUS_BIT: u32 = 0x8000_0000;

/// Description attached to every assertion error.
pub const ASSERT_DESCRIPTION: &str = "Assert";

/// Description attached to every platform fault error.
pub const FAULT_DESCRIPTION: &str = "Exception";

// A system message plus the surrounding text must still fit a rendered message.
const_assert!(SYSTEM_MESSAGE_CAPACITY * 2 <= ERROR_MESSAGE_CAPACITY);
const_assert!(LOG_LINE_CAPACITY <= ERROR_MESSAGE_CAPACITY);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bit_is_top_bit() {
        assert_eq!(CODE_STATUS_BIT, 1 << 31);
        assert_eq!(CODE_STATUS_BIT.leading_zeros(), 0);
    }

    #[test]
    fn capacities_are_consistent() {
        assert!(LOG_LINE_CAPACITY > 0);
        assert!(SYSTEM_MESSAGE_CAPACITY < ERROR_MESSAGE_CAPACITY);
    }
}
