//! Software model of the DRAM test wrapper.

use super::{join_word, split_word, FaultPlan, Handshake};
use crate::board::{Board, BoardType};
use crate::error::Result;
use procstar_chip::ram::{DmaWindow, ADDR_WIDTH, RAM_WORDS};
use procstar_chip::regs::dram_test::{
    DONE, GO, MAX_SIZE, RAM0_ADDR, RAM0_CONFIG, RAM1_ADDR, RAM1_CONFIG, RST, SIZE,
};
use procstar_chip::{AppWord, DeviceWord};
use tracing::{debug, trace, warn};

/// DRAM tester model.
///
/// Host data streams into a RAM0 staging buffer; GO copies `SIZE` words of
/// it to DRAM at `RAM0_ADDR`; the RAM1 stream then reads DRAM back from
/// `RAM1_ADDR`. Only the logical `SIZE` words are committed, so the padding
/// half of a trailing word never reaches DRAM.
#[derive(Debug)]
pub struct DramSim {
    dram: Vec<AppWord>,
    staging: Vec<AppWord>,
    ram0_words: usize,
    ram1_words: usize,
    out_cursor: usize,
    size: u32,
    ram0_addr: u32,
    ram1_addr: u32,
    handshake: Handshake,
    latency: Option<u64>,
    faults: FaultPlan,
    corrupt: Option<usize>,
    runs: u64,
}

impl Default for DramSim {
    fn default() -> Self {
        Self::new()
    }
}

impl DramSim {
    /// Zeroed DRAM, done on the first poll after GO.
    pub fn new() -> Self {
        Self {
            dram: vec![0; MAX_SIZE],
            staging: Vec::new(),
            ram0_words: 0,
            ram1_words: 0,
            out_cursor: 0,
            size: 0,
            ram0_addr: 0,
            ram1_addr: 0,
            handshake: Handshake::Idle,
            latency: Some(0),
            faults: FaultPlan::default(),
            corrupt: None,
            runs: 0,
        }
    }

    /// Hold DONE low for `polls` reads after GO.
    #[must_use]
    pub fn with_latency(mut self, polls: u64) -> Self {
        self.latency = Some(polls);
        self
    }

    /// Never assert DONE.
    #[must_use]
    pub fn hung(mut self) -> Self {
        self.latency = None;
        self
    }

    /// Fail the `call`-th transfer (0-based, reads and writes counted together).
    #[must_use]
    pub fn with_transfer_failure_at(mut self, call: u64) -> Self {
        self.faults.fail_at = Some(call);
        self
    }

    /// Flip bit 0 of DRAM cell `index` whenever a run commits over it.
    #[must_use]
    pub fn with_stuck_cell(mut self, index: usize) -> Self {
        self.corrupt = Some(index);
        self
    }

    /// DRAM contents.
    pub fn dram(&self) -> &[AppWord] {
        &self.dram
    }

    /// DRAM contents, mutable (for seeding sentinels).
    pub fn dram_mut(&mut self) -> &mut [AppWord] {
        &mut self.dram
    }

    /// Number of GO pulses seen.
    pub const fn runs(&self) -> u64 {
        self.runs
    }

    fn reset(&mut self) {
        self.staging.clear();
        self.out_cursor = 0;
        self.handshake = Handshake::Idle;
    }

    fn commit(&mut self) {
        let base = self.ram0_addr as usize;
        let len = (self.size as usize)
            .min(self.staging.len())
            .min(MAX_SIZE.saturating_sub(base));
        if len > 0 {
            self.dram[base..base + len].copy_from_slice(&self.staging[..len]);
        }
        if let Some(cell) = self.corrupt.filter(|c| (base..base + len).contains(c)) {
            self.dram[cell] ^= 1;
        }
        self.runs += 1;
        debug!(
            "DramSim: run {} committed {len} words at {base:#x}",
            self.runs
        );
        self.handshake = Handshake::start(self.latency);
    }

    fn write_register(&mut self, addr: u32, word: DeviceWord) {
        trace!("DramSim: reg {addr:#x} <- {word:#x}");
        match addr {
            RAM0_CONFIG => {
                self.ram0_words = (word >> ADDR_WIDTH) as usize;
                self.staging.clear();
            }
            RAM1_CONFIG => {
                self.ram1_words = (word >> ADDR_WIDTH) as usize;
                self.out_cursor = 0;
            }
            GO if word & 1 != 0 => self.commit(),
            RST if word & 1 != 0 => self.reset(),
            SIZE => self.size = word,
            RAM0_ADDR => self.ram0_addr = word,
            RAM1_ADDR => self.ram1_addr = word,
            GO | RST => {}
            _ => warn!("DramSim: write to unmapped register {addr:#x}"),
        }
    }

    fn read_register(&mut self, addr: u32) -> DeviceWord {
        match addr {
            DONE => self.handshake.poll(),
            SIZE => self.size,
            RAM0_ADDR => self.ram0_addr,
            RAM1_ADDR => self.ram1_addr,
            RAM0_CONFIG => {
                let words = u32::try_from(self.ram0_words).unwrap_or(0);
                DmaWindow::new(words, 0).pack()
            }
            _ => 0,
        }
    }

    fn stream_in(&mut self, word: DeviceWord) {
        for sample in split_word(word) {
            if self.staging.len() < self.ram0_words * 2 {
                self.staging.push(sample);
            }
        }
    }

    fn stream_out(&mut self) -> DeviceWord {
        let mut next = || {
            let idx = self.ram1_addr as usize + self.out_cursor;
            let sample = if self.out_cursor < self.ram1_words * 2 {
                self.dram.get(idx).copied().unwrap_or(0)
            } else {
                0
            };
            self.out_cursor += 1;
            sample
        };
        let lo = next();
        let hi = next();
        join_word(lo, hi)
    }
}

impl Board for DramSim {
    fn read_words(&mut self, addr: u32, buffer: &mut [DeviceWord]) -> Result<()> {
        self.faults.check("read", addr, buffer.len())?;
        for (a, word) in (addr..).zip(buffer.iter_mut()) {
            *word = if (a as usize) < RAM_WORDS {
                self.stream_out()
            } else {
                self.read_register(a)
            };
        }
        Ok(())
    }

    fn write_words(&mut self, addr: u32, data: &[DeviceWord]) -> Result<()> {
        self.faults.check("write", addr, data.len())?;
        for (a, &word) in (addr..).zip(data) {
            if (a as usize) < RAM_WORDS {
                self.stream_in(word);
            } else {
                self.write_register(a, word);
            }
        }
        Ok(())
    }

    fn board_type(&self) -> BoardType {
        BoardType::SimDram
    }
}
