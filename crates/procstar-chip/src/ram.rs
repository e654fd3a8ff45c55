//! RAM window geometry and the DMA window config word.
//!
//! Both accelerators expose their block RAMs through a single data port at
//! word address 0. Which RAM a block transfer lands in, and how much of it,
//! is selected beforehand by writing a config word to `RAM0_CONFIG`
//! (host → RAM0) or `RAM1_CONFIG` (RAM1 → host):
//!
//! ```text
//!  31            ADDR_WIDTH   ADDR_WIDTH-1           0
//! ┌──────────────────────────┬───────────────────────┐
//! │         count            │         base          │
//! └──────────────────────────┴───────────────────────┘
//! ```
//!
//! The base is OR'd in unmasked, exactly as the wrapper decodes it.

use crate::word::{DeviceWord, APP_WORD_BYTES, WORD_BYTES};

/// Address bits of each RAM window.
pub const ADDR_WIDTH: u32 = 15;

/// Device words per RAM window.
pub const RAM_WORDS: usize = 1 << ADDR_WIDTH;

/// Bytes per RAM window.
pub const RAM_BYTES: usize = RAM_WORDS * WORD_BYTES;

/// Application words per RAM window.
pub const RAM_APP_WORDS: usize = RAM_BYTES / APP_WORD_BYTES;

/// Word address of the host → device data port.
pub const MEM_IN_ADDR: u32 = 0;

/// Word address of the device → host data port.
pub const MEM_OUT_ADDR: u32 = 0;

/// Decoded DMA window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaWindow {
    /// Transfer length (units are accelerator specific: elements or words).
    pub count: u32,
    /// Base address inside the RAM.
    pub base: u32,
}

impl DmaWindow {
    /// Window of `count` units starting at `base`.
    #[must_use]
    pub const fn new(count: u32, base: u32) -> Self {
        Self { count, base }
    }

    /// Encode as the config register value `(count << ADDR_WIDTH) | base`.
    #[must_use]
    pub const fn pack(self) -> DeviceWord {
        (self.count << ADDR_WIDTH) | self.base
    }

    /// Decode a config register value.
    ///
    /// Only exact for bases below `1 << ADDR_WIDTH`; larger bases share bits
    /// with the count on the wire.
    #[must_use]
    pub const fn unpack(word: DeviceWord) -> Self {
        Self {
            count: word >> ADDR_WIDTH,
            base: word & ((1 << ADDR_WIDTH) - 1),
        }
    }
}
