//! Transfer granularity.
//!
//! The host link moves whole 32-bit device words. Application data (signal
//! samples, kernel coefficients, DRAM test patterns) is 16-bit, so almost
//! every transfer carries a partial trailing word. The trailing bytes are
//! don't-care on the hardware side but still cross the link.

/// Native transfer unit of the board.
pub type DeviceWord = u32;

/// Sample type used by both accelerators (signal, kernel, output, DRAM data).
pub type AppWord = u16;

/// Bytes per device word.
pub const WORD_BYTES: usize = std::mem::size_of::<DeviceWord>();

/// Bytes per application word.
pub const APP_WORD_BYTES: usize = std::mem::size_of::<AppWord>();

/// Number of device words needed to carry `bytes` bytes (rounded up).
#[must_use]
pub const fn words_for_bytes(bytes: usize) -> usize {
    bytes.div_ceil(WORD_BYTES)
}

/// Number of device words needed to carry `count` elements of `elem_bytes` each.
///
/// Wraps on overflow; callers stay inside the device's addressable range.
#[must_use]
pub const fn words_for_elements(count: usize, elem_bytes: usize) -> usize {
    words_for_bytes(count.wrapping_mul(elem_bytes))
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn rounds_partial_words_up() {
        assert_eq!(words_for_bytes(0), 0);
        assert_eq!(words_for_bytes(1), 1);
        assert_eq!(words_for_bytes(4), 1);
        assert_eq!(words_for_bytes(5), 2);
        assert_eq!(words_for_elements(3, APP_WORD_BYTES), 2);
        assert_eq!(words_for_elements(4, APP_WORD_BYTES), 2);
    }

    #[test]
    fn app_word_fits_in_device_word() {
        assert!(APP_WORD_BYTES <= WORD_BYTES);
    }
}
