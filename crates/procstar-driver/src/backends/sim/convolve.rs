//! Software model of the convolution wrapper.

use super::{join_word, split_word, FaultPlan, Handshake};
use crate::board::{Board, BoardType};
use crate::error::Result;
use procstar_chip::ram::{DmaWindow, RAM_APP_WORDS, RAM_WORDS};
use procstar_chip::regs::convolve::{
    DONE, GO, KERNEL_DATA, KERNEL_LOADED, MAX_KERNEL_SIZE, RAM0_CONFIG, RAM1_CONFIG, RST,
    SIGNAL_SIZE,
};
use procstar_chip::{AppWord, DeviceWord};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Convolution engine model.
///
/// Input RAM, output RAM and a `MAX_KERNEL_SIZE`-deep kernel shift register.
/// On GO the engine slides the full-depth kernel over the padded input RAM
/// and writes `SIGNAL_SIZE + MAX_KERNEL_SIZE - 1` saturated outputs.
#[derive(Debug)]
pub struct ConvolveSim {
    input_ram: Vec<AppWord>,
    output_ram: Vec<AppWord>,
    ram0: DmaWindow,
    ram1: DmaWindow,
    in_cursor: usize,
    out_cursor: usize,
    signal_size: u32,
    kernel: VecDeque<AppWord>,
    handshake: Handshake,
    latency: Option<u64>,
    faults: FaultPlan,
    runs: u64,
}

impl Default for ConvolveSim {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvolveSim {
    /// Idle engine that reports done on the first poll after GO.
    pub fn new() -> Self {
        Self {
            input_ram: vec![0; RAM_APP_WORDS],
            output_ram: vec![0; RAM_APP_WORDS],
            ram0: DmaWindow::new(0, 0),
            ram1: DmaWindow::new(0, 0),
            in_cursor: 0,
            out_cursor: 0,
            signal_size: 0,
            kernel: VecDeque::with_capacity(MAX_KERNEL_SIZE),
            handshake: Handshake::Idle,
            latency: Some(0),
            faults: FaultPlan::default(),
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

    /// Kernel shift register contents, oldest coefficient first.
    pub fn kernel(&self) -> Vec<AppWord> {
        self.kernel.iter().copied().collect()
    }

    /// Input RAM contents.
    pub fn input_ram(&self) -> &[AppWord] {
        &self.input_ram
    }

    /// Last value written to SIGNAL_SIZE.
    pub const fn signal_size(&self) -> u32 {
        self.signal_size
    }

    /// Number of GO pulses seen.
    pub const fn runs(&self) -> u64 {
        self.runs
    }

    fn reset(&mut self) {
        self.kernel.clear();
        self.signal_size = 0;
        self.in_cursor = 0;
        self.out_cursor = 0;
        self.handshake = Handshake::Idle;
    }

    /// Full-depth sliding window over the padded input.
    fn execute(&mut self) {
        let taps: Vec<u32> = (0..MAX_KERNEL_SIZE)
            .map(|k| u32::from(self.kernel.get(k).copied().unwrap_or(0)))
            .collect();
        let outputs = (self.signal_size as usize + MAX_KERNEL_SIZE - 1).min(RAM_APP_WORDS);
        let depth = MAX_KERNEL_SIZE - 1;

        for n in 0..outputs {
            let mut acc: u32 = 0;
            for (k, &tap) in taps.iter().enumerate() {
                let sample = self
                    .input_ram
                    .get(n + depth - k)
                    .map_or(0, |&s| u32::from(s));
                let product = (tap * sample).min(u32::from(AppWord::MAX));
                acc = (acc + product).min(u32::from(AppWord::MAX));
            }
            #[allow(clippy::cast_possible_truncation)]
            {
                self.output_ram[n] = acc as AppWord;
            }
        }
        self.runs += 1;
        debug!(
            "ConvolveSim: run {} over {} samples -> {outputs} outputs",
            self.runs, self.signal_size
        );
        self.handshake = Handshake::start(self.latency);
    }

    fn write_register(&mut self, addr: u32, word: DeviceWord) {
        trace!("ConvolveSim: reg {addr:#x} <- {word:#x}");
        match addr {
            RAM0_CONFIG => {
                self.ram0 = DmaWindow::unpack(word);
                self.in_cursor = 0;
            }
            RAM1_CONFIG => {
                self.ram1 = DmaWindow::unpack(word);
                self.out_cursor = 0;
            }
            GO if word & 1 != 0 => self.execute(),
            RST if word & 1 != 0 => self.reset(),
            SIGNAL_SIZE => self.signal_size = word,
            KERNEL_DATA => {
                #[allow(clippy::cast_possible_truncation)]
                self.kernel.push_back(word as AppWord);
                if self.kernel.len() > MAX_KERNEL_SIZE {
                    self.kernel.pop_front();
                }
            }
            GO | RST => {}
            _ => warn!("ConvolveSim: write to unmapped register {addr:#x}"),
        }
    }

    fn read_register(&mut self, addr: u32) -> DeviceWord {
        match addr {
            DONE => self.handshake.poll(),
            KERNEL_LOADED => DeviceWord::from(self.kernel.len() == MAX_KERNEL_SIZE),
            SIGNAL_SIZE => self.signal_size,
            RAM0_CONFIG => self.ram0.pack(),
            RAM1_CONFIG => self.ram1.pack(),
            _ => 0,
        }
    }

    /// Input DMA: two samples per word until the RAM0 window is full.
    fn stream_in(&mut self, word: DeviceWord) {
        for sample in split_word(word) {
            if self.in_cursor < self.ram0.count as usize {
                if let Some(slot) = self
                    .input_ram
                    .get_mut(self.ram0.base as usize + self.in_cursor)
                {
                    *slot = sample;
                }
                self.in_cursor += 1;
            }
        }
    }

    /// Output DMA: samples past the RAM1 window read as zero.
    fn stream_out(&mut self) -> DeviceWord {
        let mut next = || {
            let sample = if self.out_cursor < self.ram1.count as usize {
                self.output_ram
                    .get(self.ram1.base as usize + self.out_cursor)
                    .copied()
                    .unwrap_or(0)
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

impl Board for ConvolveSim {
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
        BoardType::SimConvolve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(sim: &mut ConvolveSim, addr: u32, word: u32) {
        sim.write_words(addr, &[word]).unwrap();
    }

    #[test]
    fn kernel_port_is_a_shift_register() {
        let mut sim = ConvolveSim::new();
        for i in 0..(MAX_KERNEL_SIZE as u32 + 2) {
            write(&mut sim, KERNEL_DATA, i);
        }
        let k = sim.kernel();
        assert_eq!(k.len(), MAX_KERNEL_SIZE);
        assert_eq!(k[0], 2);
        assert_eq!(*k.last().unwrap(), MAX_KERNEL_SIZE as u16 + 1);
    }

    #[test]
    fn input_stream_respects_window() {
        let mut sim = ConvolveSim::new();
        write(&mut sim, RAM0_CONFIG, DmaWindow::new(3, 0).pack());
        sim.write_words(0, &[0x0002_0001, 0x0004_0003]).unwrap();
        assert_eq!(&sim.input_ram()[..4], &[1, 2, 3, 0]);
    }

    #[test]
    fn reset_clears_kernel_and_done() {
        let mut sim = ConvolveSim::new();
        write(&mut sim, KERNEL_DATA, 1);
        write(&mut sim, GO, 1);
        let mut done = [0u32];
        sim.read_words(DONE, &mut done).unwrap();
        assert_eq!(done[0], 1);
        write(&mut sim, RST, 1);
        sim.read_words(DONE, &mut done).unwrap();
        assert_eq!(done[0], 0);
        assert!(sim.kernel().is_empty());
    }

    #[test]
    fn injected_failure() {
        let mut sim = ConvolveSim::new().with_transfer_failure_at(0);
        assert!(sim.write_words(RST, &[1]).is_err());
        assert!(sim.write_words(RST, &[1]).is_ok());
    }
}
