//! Simulated boards
//!
//! Register-level software models of the two accelerator wrappers. They sit
//! behind the same [`Board`](crate::Board) trait as real hardware and decode
//! the same memory map, so the protocols cannot tell them apart. This
//! enables:
//!
//! 1. **CI without hardware**: every protocol path, including the DMA window
//!    encoding and the kernel FIFO order, is checked against a model of the
//!    wrapper rather than against the host code's own assumptions.
//! 2. **Fault injection**: transfer failures, corrupted DRAM cells and a
//!    never-done accelerator can be scripted.
//! 3. **Latency**: the done flag can be held low for a number of polls to
//!    exercise the polling loop.

mod convolve;
mod dram;

pub use convolve::ConvolveSim;
pub use dram::DramSim;

use crate::error::{ProcStarError, Result};
use procstar_chip::regs::MMAP_WORDS;
use procstar_chip::{AppWord, DeviceWord};

/// Start/done handshake shared by both wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Idle,
    Busy { remaining: u64 },
    Done,
    Hung,
}

impl Handshake {
    fn start(latency: Option<u64>) -> Self {
        match latency {
            Some(remaining) => Self::Busy { remaining },
            None => Self::Hung,
        }
    }

    /// Read of the done register; each read of a busy engine counts down.
    fn poll(&mut self) -> DeviceWord {
        match *self {
            Self::Idle | Self::Hung => 0,
            Self::Done => 1,
            Self::Busy { remaining: 0 } => {
                *self = Self::Done;
                1
            }
            Self::Busy { remaining } => {
                *self = Self::Busy {
                    remaining: remaining - 1,
                };
                0
            }
        }
    }
}

/// Scripted transport failure: the `fail_at`-th transfer call (0-based) fails.
#[derive(Debug, Clone, Copy, Default)]
struct FaultPlan {
    calls: u64,
    fail_at: Option<u64>,
}

impl FaultPlan {
    fn check(&mut self, op: &str, addr: u32, words: usize) -> Result<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            return Err(ProcStarError::transfer_failed(format!(
                "simulated {op} failure ({words} words @ {addr:#x})"
            )));
        }
        if addr as usize + words > MMAP_WORDS as usize {
            return Err(ProcStarError::transfer_failed(format!(
                "{op} of {words} words @ {addr:#x} runs past the memory map"
            )));
        }
        Ok(())
    }
}

/// Low and high application words carried by one device word.
fn split_word(word: DeviceWord) -> [AppWord; 2] {
    #[allow(clippy::cast_possible_truncation)]
    [word as AppWord, (word >> 16) as AppWord]
}

fn join_word(lo: AppWord, hi: AppWord) -> DeviceWord {
    DeviceWord::from(lo) | (DeviceWord::from(hi) << 16)
}
