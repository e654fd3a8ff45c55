//! DRAM round-trip sweep.
//!
//! Square sizes at address 0, the full DRAM, then random windows. Stops at
//! the first mismatch.

use anyhow::Result;
use procstar_driver::chip::DRAM_MAX_SIZE;
use procstar_driver::{Board, DramTest, PollConfig};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::io::Write;

fn report_failure(size: usize, addr: usize) {
    println!();
    println!("ERROR: Failed test for size {size} and address {addr}");
}

fn progress(msg: &str) {
    print!("\r{msg:<48}");
    let _ = std::io::stdout().flush();
}

/// Run the sweep on `board`. `Ok(false)` means a round trip mismatched.
///
/// # Errors
///
/// Returns error if a transfer fails or a poll bound is exhausted.
pub fn run<B: Board + ?Sized>(
    board: &mut B,
    rng: &mut ChaCha8Rng,
    poll: PollConfig,
    random_tests: usize,
) -> Result<bool> {
    let mut dram = DramTest::new(board)
        .with_seed(rng.gen())
        .with_poll_config(poll);

    println!("Testing transfers to/from address 0....");
    let mut i = 1;
    while i * i <= DRAM_MAX_SIZE {
        let size = i * i;
        progress(&format!("(Size = {size})"));
        if !dram.start(size, 0)? {
            report_failure(size, 0);
            return Ok(false);
        }
        i += 1;
    }
    progress("SUCCESS");
    println!();

    println!("Testing max transfer size....");
    if !dram.start(DRAM_MAX_SIZE, 0)? {
        report_failure(DRAM_MAX_SIZE, 0);
        return Ok(false);
    }
    println!("SUCCESS");

    println!("Testing random sizes and addresses....");
    for _ in 0..random_tests {
        let size = rng.gen_range(1..=DRAM_MAX_SIZE);
        let addr = rng.gen_range(0..DRAM_MAX_SIZE);
        progress(&format!("(Size = {size}, addr = {addr})"));
        if !dram.start(size, addr)? {
            report_failure(size, addr);
            return Ok(false);
        }
    }
    progress("SUCCESS");
    println!();

    Ok(true)
}
