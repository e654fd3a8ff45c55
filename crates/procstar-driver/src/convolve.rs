//! Convolution accelerator protocol
//!
//! Drives the streaming 1D convolution engine:
//!
//! ```text
//! Idle --start--> Running --is_done() true--> Done
//!   ^                                          |
//!   +------------------- start ----------------+
//! ```
//!
//! The engine always runs a `MAX_KERNEL_SIZE`-tap pipeline, so the host
//! zero-pads the signal by `MAX_KERNEL_SIZE - 1` on each side and the
//! kernel up to `MAX_KERNEL_SIZE` coefficients. Arithmetic saturates at
//! `0xFFFF`; [`convolve_reference`] is the exact software equivalent.

use crate::board::Board;
use crate::error::{ProcStarError, Result};
use crate::poll::PollConfig;
use crate::sizing::SafeBuffer;
use crate::transfer::TransferLayer;
use procstar_chip::ram::{DmaWindow, MEM_IN_ADDR, MEM_OUT_ADDR};
use procstar_chip::regs::convolve::{
    DONE, GO, KERNEL_DATA, MAX_KERNEL_SIZE, MAX_OUTPUT_SIZE, MAX_SIGNAL_SIZE, RAM0_CONFIG,
    RAM1_CONFIG, RST, SIGNAL_SIZE,
};
use procstar_chip::word::{words_for_elements, APP_WORD_BYTES};
use procstar_chip::{AppWord, DeviceWord};
use tracing::{debug, info, trace, warn};

/// Zeros placed on each side of the signal.
pub const PAD: usize = MAX_KERNEL_SIZE - 1;

/// Signal framed by `MAX_KERNEL_SIZE - 1` zeros on both sides, in word-safe storage.
#[derive(Debug, Clone)]
pub struct PaddedSignal {
    data: SafeBuffer<AppWord>,
    unpadded_len: usize,
}

impl PaddedSignal {
    /// Pad `signal`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the signal exceeds `MAX_SIGNAL_SIZE`.
    pub fn new(signal: &[AppWord]) -> Result<Self> {
        if signal.len() > MAX_SIGNAL_SIZE {
            return Err(ProcStarError::configuration(format!(
                "signal of {} samples exceeds hardware maximum of {MAX_SIGNAL_SIZE}",
                signal.len()
            )));
        }
        let mut data = SafeBuffer::zeroed(signal.len() + 2 * PAD);
        data[PAD..PAD + signal.len()].copy_from_slice(signal);
        Ok(Self {
            data,
            unpadded_len: signal.len(),
        })
    }

    /// Padded length, `L + 2 * (MAX_KERNEL_SIZE - 1)`.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false once padded.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length of the signal before padding.
    pub const fn unpadded_len(&self) -> usize {
        self.unpadded_len
    }

    /// Padded samples.
    pub fn as_slice(&self) -> &[AppWord] {
        self.data.as_slice()
    }

    /// Word-backed storage handed to the transfer layer.
    pub const fn buffer(&self) -> &SafeBuffer<AppWord> {
        &self.data
    }
}

/// Kernel zero-extended to `MAX_KERNEL_SIZE` device words.
///
/// Each coefficient occupies a whole word because the kernel port takes one
/// write per coefficient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedKernel {
    words: Vec<DeviceWord>,
    len: usize,
}

impl PaddedKernel {
    /// Zero-extend `kernel`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcStarError::KernelTooLarge`] if `kernel` has more than
    /// `MAX_KERNEL_SIZE` coefficients.
    pub fn new(kernel: &[AppWord]) -> Result<Self> {
        if kernel.len() > MAX_KERNEL_SIZE {
            return Err(ProcStarError::KernelTooLarge {
                len: kernel.len(),
                max: MAX_KERNEL_SIZE,
            });
        }
        let mut words = vec![0; MAX_KERNEL_SIZE];
        for (slot, &k) in words.iter_mut().zip(kernel) {
            *slot = DeviceWord::from(k);
        }
        Ok(Self {
            words,
            len: kernel.len(),
        })
    }

    /// Coefficient count before padding.
    pub const fn unpadded_len(&self) -> usize {
        self.len
    }

    /// All `MAX_KERNEL_SIZE` port words, coefficients first.
    pub fn words(&self) -> &[DeviceWord] {
        &self.words
    }
}

/// Where a [`Convolve`] handle is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run started
    Idle,
    /// GO asserted, done not yet observed
    Running,
    /// Done observed; output may be read
    Done,
}

/// One convolution run in progress on a board.
#[derive(Debug)]
pub struct Convolve<'a, B: Board + ?Sized> {
    transfer: TransferLayer<'a, B>,
    poll: PollConfig,
    state: RunState,
    signal_len: usize,
    kernel_len: usize,
}

impl<'a, B: Board + ?Sized> Convolve<'a, B> {
    /// Take exclusive use of `board` for convolution runs.
    pub fn new(board: &'a mut B) -> Self {
        Self {
            transfer: TransferLayer::new(board),
            poll: PollConfig::default(),
            state: RunState::Idle,
            signal_len: 0,
            kernel_len: 0,
        }
    }

    /// Poll parameters used by [`wait_done`](Self::wait_done).
    #[must_use]
    pub const fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Current run state.
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Output length of the current run, `L + K - 1`.
    pub const fn expected_output_len(&self) -> usize {
        (self.signal_len + self.kernel_len).saturating_sub(1)
    }

    /// Load `signal` and `kernel` and start the engine.
    ///
    /// Both inputs are validated before the board is touched.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an oversized kernel or signal, or
    /// a transfer error if any board access fails.
    pub fn start(&mut self, signal: &[AppWord], kernel: &[AppWord]) -> Result<()> {
        let padded_kernel = PaddedKernel::new(kernel)?;
        let padded_signal = PaddedSignal::new(signal)?;
        let padded_len = u32::try_from(padded_signal.len())
            .map_err(|_| ProcStarError::configuration("padded signal length overflows"))?;
        let signal_size = u32::try_from(signal.len())
            .map_err(|_| ProcStarError::configuration("signal length overflows"))?;

        debug!(
            "Convolve: signal {} (padded {padded_len}), kernel {}",
            signal.len(),
            kernel.len()
        );

        // Step 1: reset the engine
        self.state = RunState::Idle;
        self.transfer.write_scalar::<DeviceWord>(1, RST)?;

        // Step 2: stream the padded signal into the input RAM
        self.transfer
            .write_scalar(DmaWindow::new(padded_len, MEM_IN_ADDR).pack(), RAM0_CONFIG)?;
        self.transfer
            .write_array(padded_signal.buffer(), MEM_IN_ADDR, padded_signal.len())?;

        // Step 3: unpadded length, then the full-depth kernel
        self.transfer.write_scalar(signal_size, SIGNAL_SIZE)?;
        self.transfer
            .write_stream(padded_kernel.words(), KERNEL_DATA)?;

        // Step 4: go
        self.transfer.write_scalar::<DeviceWord>(1, GO)?;

        self.signal_len = signal.len();
        self.kernel_len = kernel.len();
        self.state = RunState::Running;
        info!(
            "Convolve started on {}: {} x {} -> {}",
            self.transfer.board().board_type(),
            self.signal_len,
            self.kernel_len,
            self.expected_output_len()
        );
        Ok(())
    }

    /// Read the done flag once.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error if no run was started, or a transfer
    /// error if the read fails.
    pub fn is_done(&mut self) -> Result<bool> {
        match self.state {
            RunState::Idle => {
                Err(ProcStarError::invalid_state("is_done() called before start()"))
            }
            RunState::Done => Ok(true),
            RunState::Running => {
                let done = self.transfer.read_scalar::<DeviceWord>(DONE)? != 0;
                if done {
                    trace!("Convolve: done");
                    self.state = RunState::Done;
                }
                Ok(done)
            }
        }
    }

    /// Poll the done flag per the configured [`PollConfig`].
    ///
    /// # Errors
    ///
    /// Propagates [`is_done`](Self::is_done) failures, and returns a timeout
    /// if the poll bound is exhausted.
    pub fn wait_done(&mut self) -> Result<u64> {
        let poll = self.poll;
        let polls = poll.poll_until(|| self.is_done())?;
        debug!("Convolve: done after {polls} polls");
        Ok(polls)
    }

    /// Read `output_size` results into the front of `output`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-state error if no run was started, a configuration
    /// error if `output_size` exceeds the output RAM or `output`, or a
    /// transfer error if a board access fails.
    pub fn get_output(
        &mut self,
        output: &mut SafeBuffer<AppWord>,
        output_size: usize,
    ) -> Result<()> {
        match self.state {
            RunState::Idle => {
                return Err(ProcStarError::invalid_state("get_output() called before start()"));
            }
            RunState::Running => warn!("Convolve: reading output before done was observed"),
            RunState::Done => {}
        }
        if output_size > MAX_OUTPUT_SIZE {
            return Err(ProcStarError::configuration(format!(
                "output of {output_size} samples exceeds hardware maximum of {MAX_OUTPUT_SIZE}"
            )));
        }
        if output_size != self.expected_output_len() {
            warn!(
                "Convolve: reading {output_size} outputs, run produces {}",
                self.expected_output_len()
            );
        }
        let count = u32::try_from(output_size)
            .map_err(|_| ProcStarError::configuration("output length overflows"))?;
        let needed = words_for_elements(output_size, APP_WORD_BYTES);
        if needed > output.words().len() {
            return Err(ProcStarError::BufferTooSmall {
                needed,
                available: output.words().len(),
            });
        }

        self.transfer
            .write_scalar(DmaWindow::new(count, MEM_OUT_ADDR).pack(), RAM1_CONFIG)?;
        self.transfer.read_array(output, MEM_OUT_ADDR, output_size)
    }

    /// Start, wait and fetch the full `L + K - 1` output.
    ///
    /// # Errors
    ///
    /// Any error from [`start`](Self::start), [`wait_done`](Self::wait_done)
    /// or [`get_output`](Self::get_output).
    pub fn run(&mut self, signal: &[AppWord], kernel: &[AppWord]) -> Result<Vec<AppWord>> {
        self.start(signal, kernel)?;
        self.wait_done()?;
        let len = self.expected_output_len();
        let mut output = SafeBuffer::zeroed(len);
        self.get_output(&mut output, len)?;
        Ok(output.to_vec())
    }
}

/// Saturating 1D convolution, the software twin of the engine.
///
/// `out[n] = sat(sum_k sat(kernel[k] * signal[n - k]))` for
/// `n < L + K - 1`, where both saturations clamp at `0xFFFF`.
pub fn convolve_reference(signal: &[AppWord], kernel: &[AppWord]) -> Vec<AppWord> {
    let out_len = (signal.len() + kernel.len()).saturating_sub(1);
    if signal.is_empty() || kernel.is_empty() {
        return vec![0; out_len];
    }
    let max = u32::from(AppWord::MAX);
    (0..out_len)
        .map(|n| {
            let lo = n.saturating_sub(signal.len() - 1);
            let hi = n.min(kernel.len() - 1);
            let acc = (lo..=hi).fold(0u32, |acc, k| {
                let product = (u32::from(kernel[k]) * u32::from(signal[n - k])).min(max);
                (acc + product).min(max)
            });
            AppWord::try_from(acc).unwrap_or(AppWord::MAX)
        })
        .collect()
}

/// Comparison of a hardware result against the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputCheck {
    /// Indices where the outputs differ (including length mismatch tails)
    pub errors: Vec<usize>,
    /// Share of matching samples, 0 to 100
    pub percent_correct: f64,
}

impl OutputCheck {
    /// True if every sample matched.
    pub fn is_exact(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compare `hw` against `sw` sample by sample.
///
/// Samples present in only one of the two count as errors. Two empty
/// outputs are 100% correct.
pub fn check_output(sw: &[AppWord], hw: &[AppWord]) -> OutputCheck {
    let len = sw.len().max(hw.len());
    let errors: Vec<usize> = (0..len).filter(|&i| sw.get(i) != hw.get(i)).collect();
    #[allow(clippy::cast_precision_loss)]
    let percent_correct = if len == 0 {
        100.0
    } else {
        (len - errors.len()) as f64 / len as f64 * 100.0
    };
    OutputCheck {
        errors,
        percent_correct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sim::ConvolveSim;
    use crate::error::ErrorKind;
    use crate::transfer::tests::MemBoard;

    #[test]
    fn padded_signal_frames_with_zeros() {
        let p = PaddedSignal::new(&[1, 2, 3]).unwrap();
        assert_eq!(p.len(), 3 + 2 * PAD);
        assert_eq!(p.unpadded_len(), 3);
        assert!(p.as_slice()[..PAD].iter().all(|&x| x == 0));
        assert_eq!(&p.as_slice()[PAD..PAD + 3], &[1, 2, 3]);
        assert!(p.as_slice()[PAD + 3..].iter().all(|&x| x == 0));
    }

    #[test]
    fn padded_kernel_zero_extends() {
        let k = PaddedKernel::new(&[4, 5]).unwrap();
        assert_eq!(k.words().len(), MAX_KERNEL_SIZE);
        assert_eq!(&k.words()[..2], &[4, 5]);
        assert!(k.words()[2..].iter().all(|&x| x == 0));
    }

    #[test]
    fn oversized_kernel_touches_nothing() {
        let mut board = MemBoard::default();
        let kernel = vec![1u16; MAX_KERNEL_SIZE + 1];
        let err = Convolve::new(&mut board)
            .start(&[1, 2], &kernel)
            .unwrap_err();
        assert!(matches!(err, ProcStarError::KernelTooLarge { len: 129, max: 128 }));
        assert!(board.writes.is_empty());
    }

    #[test]
    fn start_writes_registers_in_order() {
        let mut board = MemBoard::default();
        Convolve::new(&mut board)
            .start(&[7, 8, 9], &[1, 1])
            .unwrap();

        let addrs: Vec<u32> = board.writes.iter().map(|(a, _)| *a).collect();
        assert_eq!(addrs[..4], [RST, RAM0_CONFIG, MEM_IN_ADDR, SIGNAL_SIZE]);
        assert_eq!(
            addrs.iter().filter(|&&a| a == KERNEL_DATA).count(),
            MAX_KERNEL_SIZE
        );
        assert_eq!(*addrs.last().unwrap(), GO);

        let padded = u32::try_from(3 + 2 * PAD).unwrap();
        assert_eq!(board.writes[1].1, vec![DmaWindow::new(padded, 0).pack()]);
        assert_eq!(board.writes[3].1, vec![3]);
    }

    #[test]
    fn output_before_start_is_state_error() {
        let mut board = MemBoard::default();
        let mut conv = Convolve::new(&mut board);
        let mut out = SafeBuffer::zeroed(4);
        assert_eq!(
            conv.get_output(&mut out, 4).unwrap_err().kind(),
            ErrorKind::State
        );
        assert_eq!(conv.is_done().unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn undersized_output_buffer_leaves_window_alone() {
        let mut board = MemBoard::default();
        board.mem.insert(DONE, 1);
        let mut conv = Convolve::new(&mut board);
        conv.start(&[1; 10], &[1; 4]).unwrap();
        conv.wait_done().unwrap();

        let mut out = SafeBuffer::zeroed(4);
        let err = conv.get_output(&mut out, 13).unwrap_err();
        assert!(matches!(
            err,
            ProcStarError::BufferTooSmall {
                needed: 7,
                available: 2
            }
        ));
        assert!(board.writes.iter().all(|(addr, _)| *addr != RAM1_CONFIG));
    }

    #[test]
    fn done_is_sticky() {
        let mut sim = ConvolveSim::new().with_latency(2);
        let mut conv = Convolve::new(&mut sim);
        conv.start(&[1], &[1]).unwrap();
        assert!(!conv.is_done().unwrap());
        assert!(!conv.is_done().unwrap());
        assert!(conv.is_done().unwrap());
        assert_eq!(conv.state(), RunState::Done);
        assert!(conv.is_done().unwrap());
    }

    #[test]
    fn reference_small_case() {
        assert_eq!(convolve_reference(&[1, 2, 3], &[1, 1]), vec![1, 3, 5, 3]);
        assert!(convolve_reference(&[], &[]).is_empty());
        assert_eq!(convolve_reference(&[], &[1, 2]), vec![0]);
    }

    #[test]
    fn reference_saturates_products_and_sums() {
        assert_eq!(convolve_reference(&[0x1000], &[0x100]), vec![0xFFFF]);
        assert_eq!(
            convolve_reference(&[0x8000, 0x8000], &[1, 1]),
            vec![0x8000, 0xFFFF, 0x8000]
        );
    }

    #[test]
    fn check_output_counts_mismatches() {
        let c = check_output(&[1, 2, 3, 4], &[1, 0, 3, 4]);
        assert_eq!(c.errors, vec![1]);
        assert!((c.percent_correct - 75.0).abs() < f64::EPSILON);

        let short = check_output(&[1, 2], &[1]);
        assert_eq!(short.errors, vec![1]);
        assert!(check_output(&[], &[]).is_exact());
    }
}
