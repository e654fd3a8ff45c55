//! Board transport abstraction
//!
//! A board moves whole device words to and from a word address in the
//! accelerator's memory map. Everything above this trait (typed transfers,
//! protocols) is transport agnostic; everything below it (mmap, simulation)
//! knows nothing about accelerators.

use crate::backends::mmap::MmapBoard;
use crate::backends::sim::{ConvolveSim, DramSim};
use crate::error::Result;
use procstar_chip::DeviceWord;
use std::fmt::Debug;

/// Word-granular transport to one board.
///
/// Both operations are blocking and all-or-nothing: an `Err` means the
/// transfer failed and the device memory state afterwards is unspecified.
pub trait Board: Debug {
    /// Read `buffer.len()` words starting at word address `addr`.
    ///
    /// # Errors
    ///
    /// Returns a transfer error if the transport reports failure.
    fn read_words(&mut self, addr: u32, buffer: &mut [DeviceWord]) -> Result<()>;

    /// Write `data.len()` words starting at word address `addr`.
    ///
    /// # Errors
    ///
    /// Returns a transfer error if the transport reports failure.
    fn write_words(&mut self, addr: u32, data: &[DeviceWord]) -> Result<()>;

    /// Board type for logging.
    fn board_type(&self) -> BoardType;
}

impl<B: Board + ?Sized> Board for Box<B> {
    fn read_words(&mut self, addr: u32, buffer: &mut [DeviceWord]) -> Result<()> {
        (**self).read_words(addr, buffer)
    }

    fn write_words(&mut self, addr: u32, data: &[DeviceWord]) -> Result<()> {
        (**self).write_words(addr, data)
    }

    fn board_type(&self) -> BoardType {
        (**self).board_type()
    }
}

/// Board type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardType {
    /// PCI BAR mapped into the process
    Mmap,

    /// Software model of the convolution wrapper
    SimConvolve,

    /// Software model of the DRAM test wrapper
    SimDram,
}

impl std::fmt::Display for BoardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmap => write!(f, "Mmap"),
            Self::SimConvolve => write!(f, "Simulated (convolve)"),
            Self::SimDram => write!(f, "Simulated (dram_test)"),
        }
    }
}

/// Which accelerator bitstream the board is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accelerator {
    /// Streaming convolution engine
    Convolve,
    /// DRAM round-trip tester
    DramTest,
}

/// Board selection strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardSelection {
    /// Software model matching the requested accelerator
    Simulated,

    /// Memory-mapped PCI BAR (`pcie_address`, `bar_index`)
    Mmap {
        /// PCIe address, e.g. `0000:03:00.0`
        pcie_address: String,
        /// BAR exposing the memory map
        bar_index: usize,
    },
}

/// Open a board for `accelerator`.
///
/// Bitstream programming and clock setup happen outside this crate; a
/// memory-mapped board must already be configured.
///
/// # Errors
///
/// Returns error if the selected board cannot be opened.
pub fn open_board(selection: &BoardSelection, accelerator: Accelerator) -> Result<Box<dyn Board>> {
    match selection {
        BoardSelection::Simulated => {
            tracing::info!("Using simulated board for {accelerator:?}");
            Ok(match accelerator {
                Accelerator::Convolve => Box::new(ConvolveSim::new()),
                Accelerator::DramTest => Box::new(DramSim::new()),
            })
        }
        BoardSelection::Mmap {
            pcie_address,
            bar_index,
        } => {
            tracing::info!("Using BAR{bar_index} of {pcie_address} for {accelerator:?}");
            MmapBoard::open(pcie_address, *bar_index).map(|b| Box::new(b) as Box<dyn Board>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procstar_chip::regs::dram_test;

    #[test]
    fn boxed_board_forwards() {
        let mut board = open_board(&BoardSelection::Simulated, Accelerator::DramTest).unwrap();
        assert_eq!(board.board_type(), BoardType::SimDram);
        let mut done = [0u32; 1];
        board.read_words(dram_test::DONE, &mut done).unwrap();
        assert_eq!(done[0], 0);
    }

    #[test]
    fn mmap_board_missing_device() {
        let err = open_board(
            &BoardSelection::Mmap {
                pcie_address: "ffff:ff:1f.7".into(),
                bar_index: 0,
            },
            Accelerator::Convolve,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::State);
    }
}
