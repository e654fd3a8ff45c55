//! Board implementations
//!
//! Two kinds available:
//! - **Mmap**: PCI BAR of a configured board mapped into the process
//! - **Sim**: software models of the convolution and DRAM test wrappers

pub mod mmap;
pub mod sim;

pub use mmap::MmapBoard;
pub use sim::{ConvolveSim, DramSim};
