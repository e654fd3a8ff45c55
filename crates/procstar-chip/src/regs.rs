//! Register maps of the two accelerator wrappers.
//!
//! Each wrapper reserves the top eight words of the memory map for its
//! registers. The order differs between the two designs, so each gets its
//! own module; nothing is shared except [`top`].
//!
//! ```text
//!            convolve          dram_test
//! top-8      RAM0_CONFIG       RST
//! top-7      RAM1_CONFIG       RAM0_CONFIG
//! top-6      GO                RAM1_CONFIG
//! top-5      RST               GO
//! top-4      KERNEL_LOADED     RAM0_ADDR
//! top-3      KERNEL_DATA       RAM1_ADDR
//! top-2      SIGNAL_SIZE       SIZE
//! top-1      DONE              DONE
//! ```

/// Word-address width of the board memory map.
pub const MMAP_ADDR_WIDTH: u32 = 18;

/// Number of words in the memory map.
pub const MMAP_WORDS: u32 = 1 << MMAP_ADDR_WIDTH;

/// Word address `n` below the top of the memory map.
#[must_use]
pub const fn top(n: u32) -> u32 {
    MMAP_WORDS - n
}

/// Streaming 1-D convolution engine.
pub mod convolve {
    use super::top;
    use crate::ram::RAM_BYTES;
    use crate::word::APP_WORD_BYTES;

    /// DMA window for host → input RAM.
    pub const RAM0_CONFIG: u32 = top(8);
    /// DMA window for output RAM → host.
    pub const RAM1_CONFIG: u32 = top(7);
    /// Write 1 to start; self-clearing.
    pub const GO: u32 = top(6);
    /// Write 1 to reset; self-clearing.
    pub const RST: u32 = top(5);
    /// Kernel shift register full flag (read-only, unused by the host flow).
    pub const KERNEL_LOADED: u32 = top(4);
    /// Streaming kernel coefficient port, one coefficient per word write.
    pub const KERNEL_DATA: u32 = top(3);
    /// Unpadded signal length.
    pub const SIGNAL_SIZE: u32 = top(2);
    /// Completion flag (read-only).
    pub const DONE: u32 = top(1);

    /// Depth of the hardware pipeline; kernels longer than this are rejected.
    pub const MAX_KERNEL_SIZE: usize = 128;

    /// Longest signal accepted, leaving room for pre- and post-padding.
    ///
    /// Mirrors the wrapper's own sizing rule, which reserves the padding in
    /// bytes rather than samples and so is slightly conservative.
    pub const MAX_SIGNAL_SIZE: usize =
        RAM_BYTES / APP_WORD_BYTES - 2 * (MAX_KERNEL_SIZE - 1) * APP_WORD_BYTES;

    /// Longest output the output RAM can hold.
    pub const MAX_OUTPUT_SIZE: usize = RAM_BYTES / APP_WORD_BYTES;
}

/// DRAM write/readback integrity tester.
pub mod dram_test {
    use super::top;
    use crate::ram::RAM_WORDS;
    use crate::word::{APP_WORD_BYTES, WORD_BYTES};

    /// Write 1 to reset; self-clearing.
    pub const RST: u32 = top(8);
    /// DMA window for host → RAM0.
    pub const RAM0_CONFIG: u32 = top(7);
    /// DMA window for RAM1 → host.
    pub const RAM1_CONFIG: u32 = top(6);
    /// Write 1 to start; self-clearing.
    pub const GO: u32 = top(5);
    /// DRAM base address for the RAM0 → DRAM copy.
    pub const RAM0_ADDR: u32 = top(4);
    /// DRAM base address for the DRAM → RAM1 copy.
    pub const RAM1_ADDR: u32 = top(3);
    /// Logical test length in application words.
    pub const SIZE: u32 = top(2);
    /// Completion flag (read-only).
    pub const DONE: u32 = top(1);

    /// Addressable DRAM test range in application words.
    pub const MAX_SIZE: usize = RAM_WORDS * WORD_BYTES / APP_WORD_BYTES;
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn register_blocks_sit_at_top_of_map() {
        assert_eq!(convolve::DONE, MMAP_WORDS - 1);
        assert_eq!(convolve::RAM0_CONFIG, MMAP_WORDS - 8);
        assert_eq!(dram_test::RST, MMAP_WORDS - 8);
        assert_eq!(dram_test::DONE, MMAP_WORDS - 1);
    }

    #[test]
    fn convolve_registers_non_overlapping() {
        let regs = [
            convolve::RAM0_CONFIG,
            convolve::RAM1_CONFIG,
            convolve::GO,
            convolve::RST,
            convolve::KERNEL_LOADED,
            convolve::KERNEL_DATA,
            convolve::SIGNAL_SIZE,
            convolve::DONE,
        ];
        for (i, a) in regs.iter().enumerate() {
            for b in &regs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn registers_clear_of_ram_window() {
        assert!(dram_test::RST as usize > crate::ram::RAM_WORDS);
        assert!(convolve::RAM0_CONFIG as usize > crate::ram::RAM_WORDS);
    }

    #[test]
    fn hardware_limits() {
        assert_eq!(convolve::MAX_SIGNAL_SIZE, 65_028);
        assert_eq!(convolve::MAX_OUTPUT_SIZE, 65_536);
        assert_eq!(dram_test::MAX_SIZE, 65_536);
        assert!(
            convolve::MAX_SIGNAL_SIZE + 2 * (convolve::MAX_KERNEL_SIZE - 1)
                <= crate::ram::RAM_APP_WORDS
        );
    }
}
