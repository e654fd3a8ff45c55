//! Scored convolution suite.
//!
//! Eight cases of growing size, each run on the board and in software.
//! A case's score is its fraction of correct samples times its weight;
//! a failed run scores zero and the suite moves on.

use procstar_driver::chip::{AppWord, MAX_KERNEL_SIZE, MAX_SIGNAL_SIZE};
use procstar_driver::{check_output, convolve_reference, Board, Convolve, PollConfig};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::warn;

const SMALL: (usize, usize) = (10, 4);
const MEDIUM: (usize, usize) = (1000, 40);
const BIG: (usize, usize) = (MAX_SIGNAL_SIZE, MAX_KERNEL_SIZE);

#[derive(Debug, Clone, Copy)]
enum Fill {
    Zeros,
    Ones,
    /// Values below 0xf, small enough that nothing saturates
    RandNoClip,
    /// Full-range values; products and sums saturate
    Rand,
}

struct Case {
    name: &'static str,
    size: (usize, usize),
    fill: Fill,
    weight: f64,
}

const CASES: [Case; 8] = [
    Case {
        name: "small signal/kernel with all 0s",
        size: SMALL,
        fill: Fill::Zeros,
        weight: 0.05,
    },
    Case {
        name: "small signal/kernel with all 1s",
        size: SMALL,
        fill: Fill::Ones,
        weight: 0.10,
    },
    Case {
        name: "small signal/kernel with random values (no clipping)",
        size: SMALL,
        fill: Fill::RandNoClip,
        weight: 0.10,
    },
    Case {
        name: "medium signal/kernel with random values (no clipping)",
        size: MEDIUM,
        fill: Fill::RandNoClip,
        weight: 0.15,
    },
    Case {
        name: "big signal/kernel with random values (no clipping)",
        size: BIG,
        fill: Fill::RandNoClip,
        weight: 0.15,
    },
    Case {
        name: "small signal/kernel with random values",
        size: SMALL,
        fill: Fill::Rand,
        weight: 0.10,
    },
    Case {
        name: "medium signal/kernel with random values",
        size: MEDIUM,
        fill: Fill::Rand,
        weight: 0.15,
    },
    Case {
        name: "big signal/kernel with random values",
        size: BIG,
        fill: Fill::Rand,
        weight: 0.20,
    },
];

fn generate(fill: Fill, len: usize, rng: &mut ChaCha8Rng) -> Vec<AppWord> {
    match fill {
        Fill::Zeros => vec![0; len],
        Fill::Ones => vec![1; len],
        Fill::RandNoClip => (0..len).map(|_| rng.gen_range(0..0xf)).collect(),
        Fill::Rand => (0..len).map(|_| rng.gen()).collect(),
    }
}

/// Run every case on `board`; returns the total score out of 100.
pub fn run<B: Board + ?Sized>(board: &mut B, rng: &mut ChaCha8Rng, poll: PollConfig) -> f64 {
    let mut score = 0.0;

    for case in &CASES {
        println!("Testing {}...", case.name);
        let (signal_len, kernel_len) = case.size;
        let signal = generate(case.fill, signal_len, rng);
        let kernel = generate(case.fill, kernel_len, rng);

        let hw_start = Instant::now();
        let hw = Convolve::new(&mut *board)
            .with_poll_config(poll)
            .run(&signal, &kernel);
        let hw_time = hw_start.elapsed();

        let sw_start = Instant::now();
        let sw = convolve_reference(&signal, &kernel);
        let sw_time = sw_start.elapsed();

        let fraction = match hw {
            Ok(hw) => {
                let check = check_output(&sw, &hw);
                for &i in &check.errors {
                    println!(
                        "Error for output {i}: HW = {}, SW = {}",
                        hw.get(i).copied().unwrap_or_default(),
                        sw.get(i).copied().unwrap_or_default()
                    );
                }
                check.percent_correct / 100.0
            }
            Err(e) => {
                warn!("Hardware run failed: {e}");
                println!("Hardware run failed: {e}");
                0.0
            }
        };

        let speedup = sw_time.as_secs_f64() / hw_time.as_secs_f64().max(f64::MIN_POSITIVE);
        println!("Percent correct = {:.2}", fraction * 100.0);
        println!("Speedup = {speedup:.3}");
        println!();

        score += fraction * case.weight;
    }

    score * 100.0
}
