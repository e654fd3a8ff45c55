//! DRAM round-trip test protocol
//!
//! Writes a block of random application words into on-board DRAM through
//! the RAM0 window, has the wrapper copy it back out through RAM1, and
//! compares the two byte for byte. A mismatch is a test result, not an
//! error; only transport failures and timeouts are errors.

use crate::board::Board;
use crate::error::{ProcStarError, Result};
use crate::poll::PollConfig;
use crate::sizing::SafeBuffer;
use crate::transfer::TransferLayer;
use procstar_chip::ram::{DmaWindow, MEM_IN_ADDR, MEM_OUT_ADDR};
use procstar_chip::regs::dram_test::{
    DONE, GO, MAX_SIZE, RAM0_ADDR, RAM0_CONFIG, RAM1_ADDR, RAM1_CONFIG, RST, SIZE,
};
use procstar_chip::word::{words_for_elements, APP_WORD_BYTES};
use procstar_chip::{AppWord, DeviceWord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

/// Largest `size` that keeps `addr + size` within DRAM.
///
/// An `addr` at or past the end leaves nothing to test.
pub const fn clamp_size(size: usize, addr: usize) -> usize {
    let room = MAX_SIZE.saturating_sub(addr);
    if size > room {
        room
    } else {
        size
    }
}

/// DRAM tester bound to one board.
#[derive(Debug)]
pub struct DramTest<'a, B: Board + ?Sized> {
    transfer: TransferLayer<'a, B>,
    poll: PollConfig,
    rng: ChaCha8Rng,
}

impl<'a, B: Board + ?Sized> DramTest<'a, B> {
    /// Take exclusive use of `board`; test data is seeded from the OS.
    pub fn new(board: &'a mut B) -> Self {
        Self {
            transfer: TransferLayer::new(board),
            poll: PollConfig::default(),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Reproducible test data.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Poll parameters for the done flag.
    #[must_use]
    pub const fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Round-trip `size` random words through DRAM at word `addr`.
    ///
    /// `size` is silently reduced so that `addr + size <= MAX_SIZE`.
    /// Returns whether the read-back matched.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `addr` does not fit a register, a
    /// transfer error if a board access fails, or a timeout if a poll bound
    /// is configured and exhausted.
    pub fn start(&mut self, size: usize, addr: usize) -> Result<bool> {
        let requested = size;
        let size = clamp_size(size, addr);
        if size != requested {
            warn!("DramTest: size {requested} at {addr:#x} clamped to {size}");
        }
        let addr_reg = u32::try_from(addr)
            .map_err(|_| ProcStarError::configuration(format!("DRAM address {addr} overflows")))?;
        let size_reg = u32::try_from(size)
            .map_err(|_| ProcStarError::configuration(format!("DRAM size {size} overflows")))?;
        let dma_words = u32::try_from(words_for_elements(size, APP_WORD_BYTES))
            .map_err(|_| ProcStarError::configuration("DMA word count overflows"))?;

        let mut input = SafeBuffer::<AppWord>::zeroed(size);
        self.rng.fill(input.as_mut_slice());
        let mut output = SafeBuffer::<AppWord>::zeroed(size);

        debug!("DramTest: {size} words ({dma_words} device words) at {addr:#x}");

        // Step 1: reset
        self.transfer.write_scalar::<DeviceWord>(1, RST)?;

        // Step 2: stream input into DRAM
        let window = DmaWindow::new(dma_words, addr_reg).pack();
        self.transfer.write_scalar(window, RAM0_CONFIG)?;
        self.transfer.write_array(&input, MEM_IN_ADDR, size)?;
        self.transfer.write_scalar(size_reg, SIZE)?;
        self.transfer.write_scalar(addr_reg, RAM0_ADDR)?;
        self.transfer.write_scalar(addr_reg, RAM1_ADDR)?;
        self.transfer.write_scalar::<DeviceWord>(1, GO)?;

        // Step 3: wait for the copy
        let transfer = &mut self.transfer;
        let polls = self
            .poll
            .poll_until(|| Ok(transfer.read_scalar::<DeviceWord>(DONE)? != 0))?;

        // Step 4: read back through RAM1
        self.transfer.write_scalar(window, RAM1_CONFIG)?;
        self.transfer.read_array(&mut output, MEM_OUT_ADDR, size)?;

        let passed = input.as_bytes() == output.as_bytes();
        if passed {
            debug!("DramTest: {size} words at {addr:#x} ok after {polls} polls");
        } else {
            let first = input
                .iter()
                .zip(output.iter())
                .position(|(a, b)| a != b)
                .unwrap_or(0);
            info!("DramTest: mismatch for {size} words at {addr:#x}, first at offset {first}");
        }
        Ok(passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sim::DramSim;
    use crate::transfer::tests::MemBoard;

    #[test]
    fn clamp_keeps_window_in_dram() {
        assert_eq!(clamp_size(10, 0), 10);
        assert_eq!(clamp_size(10, MAX_SIZE - 4), 4);
        assert_eq!(clamp_size(10, MAX_SIZE), 0);
        assert_eq!(clamp_size(10, MAX_SIZE + 7), 0);
    }

    #[test]
    fn register_sequence() {
        let mut board = MemBoard::default();
        board.mem.insert(DONE, 1);
        DramTest::new(&mut board).with_seed(1).start(3, 5).unwrap();

        let addrs: Vec<u32> = board.writes.iter().map(|(a, _)| *a).collect();
        assert_eq!(
            addrs,
            vec![RST, RAM0_CONFIG, MEM_IN_ADDR, SIZE, RAM0_ADDR, RAM1_ADDR, GO, RAM1_CONFIG]
        );
        let window = DmaWindow::new(2, 5).pack();
        assert_eq!(board.writes[1].1, vec![window]);
        assert_eq!(board.writes[2].1.len(), 2);
        assert_eq!(board.writes[3].1, vec![3]);
        assert_eq!(board.writes[7].1, vec![window]);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut a = DramSim::new();
        let mut b = DramSim::new();
        assert!(DramTest::new(&mut a).with_seed(9).start(16, 0).unwrap());
        assert!(DramTest::new(&mut b).with_seed(9).start(16, 0).unwrap());
        assert_eq!(a.dram()[..16], b.dram()[..16]);
    }
}
