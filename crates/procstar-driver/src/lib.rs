//! Host driver for the PROCStar accelerator wrappers.
//!
//! Two accelerators share one transport: a streaming 1D convolution engine
//! and a DRAM round-trip tester. Each is a block of control registers at
//! the top of a word-addressed memory map plus a RAM window at address 0.
//!
//! ```text
//! Convolve / DramTest       protocol state machines
//!         |
//! TransferLayer              typed scalar / array / FIFO-stream transfers
//!         |
//! Board (trait)              word reads and writes
//!   MmapBoard                  PCI BAR via mmap
//!   ConvolveSim / DramSim      software models for CI
//! ```
//!
//! # Quick start
//!
//! ```
//! use procstar_driver::{convolve_reference, Convolve, ConvolveSim};
//!
//! # fn main() -> procstar_driver::Result<()> {
//! let mut board = ConvolveSim::new();
//! let out = Convolve::new(&mut board).run(&[1, 2, 3], &[1, 1])?;
//! assert_eq!(out, convolve_reference(&[1, 2, 3], &[1, 1]));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod board;
mod convolve;
mod dram_test;
mod error;
mod poll;
mod sizing;
mod transfer;

/// Silicon constants (re-exported from procstar-chip).
pub mod chip {
    pub use procstar_chip::ram::{ADDR_WIDTH, MEM_IN_ADDR, MEM_OUT_ADDR};
    pub use procstar_chip::regs::convolve::{MAX_KERNEL_SIZE, MAX_OUTPUT_SIZE, MAX_SIGNAL_SIZE};
    pub use procstar_chip::regs::dram_test::MAX_SIZE as DRAM_MAX_SIZE;
    pub use procstar_chip::{AppWord, DeviceWord, DmaWindow};
}

pub use backends::{ConvolveSim, DramSim, MmapBoard};
pub use board::{open_board, Accelerator, Board, BoardSelection, BoardType};
pub use convolve::{
    check_output, convolve_reference, Convolve, OutputCheck, PaddedKernel, PaddedSignal,
    RunState, PAD,
};
pub use dram_test::{clamp_size, DramTest};
pub use error::{ErrorKind, ProcStarError, Result};
pub use poll::PollConfig;
pub use sizing::{checked_safe_transfer_size, safe_allocate, safe_transfer_size, SafeBuffer};
pub use transfer::TransferLayer;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        open_board, Accelerator, Board, BoardSelection, Convolve, DramTest, ErrorKind,
        PollConfig, ProcStarError, Result, SafeBuffer, TransferLayer,
    };
}
