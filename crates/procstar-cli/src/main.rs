//! `procstar` — benchmark driver for the PROCStar accelerators.
//!
//! ```text
//! USAGE:
//!   procstar convolve               Scored convolution suite (HW vs SW)
//!   procstar dram-test              DRAM round-trip sweep
//!
//! Board selection (any subcommand):
//!   --board sim                     Software model (default)
//!   --board mmap --pcie-addr ADDR   Configured board, BAR via sysfs
//! ```
//!
//! Exits nonzero if the board cannot be opened or a DRAM round trip fails.

mod convolve_suite;
mod dram_suite;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use procstar_driver::{open_board, Accelerator, BoardSelection, PollConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "procstar", about = "PROCStar accelerator benchmark driver", version)]
struct Cli {
    /// Board backend.
    #[arg(long, value_enum, default_value_t = BoardArg::Sim, global = true)]
    board: BoardArg,

    /// PCIe address of the board (mmap backend).
    #[arg(long, default_value = "0000:03:00.0", global = true)]
    pcie_addr: String,

    /// BAR exposing the accelerator memory map (mmap backend).
    #[arg(long, default_value_t = 0, global = true)]
    bar: usize,

    /// Seed for test data; random if omitted.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Sleep between done-flag polls, in microseconds; spins if omitted.
    #[arg(long, global = true)]
    poll_interval_us: Option<u64>,

    /// Give up on a run after this many polls; waits forever if omitted.
    #[arg(long, global = true)]
    max_polls: Option<u64>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum BoardArg {
    /// Software model of the selected accelerator.
    Sim,
    /// Memory-mapped PCI BAR of a configured board.
    Mmap,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the eight scored convolution cases.
    Convolve,
    /// Round-trip square, maximum and random windows through DRAM.
    DramTest {
        /// Number of random (size, address) tests.
        #[arg(long, default_value_t = 500)]
        random_tests: usize,
    },
}

impl Cli {
    fn selection(&self) -> BoardSelection {
        match self.board {
            BoardArg::Sim => BoardSelection::Simulated,
            BoardArg::Mmap => BoardSelection::Mmap {
                pcie_address: self.pcie_addr.clone(),
                bar_index: self.bar,
            },
        }
    }

    fn poll_config(&self) -> PollConfig {
        let mut poll = PollConfig::spin();
        if let Some(us) = self.poll_interval_us {
            poll = poll.with_interval(Duration::from_micros(us));
        }
        if let Some(max) = self.max_polls {
            poll = poll.with_max_polls(max);
        }
        poll
    }

    fn rng(&self) -> ChaCha8Rng {
        self.seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64)
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let code = match &cli.command {
        Cmd::Convolve => cmd_convolve(&cli)?,
        Cmd::DramTest { random_tests } => cmd_dram_test(&cli, *random_tests)?,
    };

    Ok(code)
}

fn cmd_convolve(cli: &Cli) -> Result<ExitCode> {
    let mut board = open_board(&cli.selection(), Accelerator::Convolve)
        .context("Failed to open board")?;
    println!("Board: {}", board.board_type());
    println!();

    let mut rng = cli.rng();
    let score = convolve_suite::run(&mut board, &mut rng, cli.poll_config());
    println!("TOTAL SCORE = {score:.1} out of 100");
    Ok(ExitCode::SUCCESS)
}

fn cmd_dram_test(cli: &Cli, random_tests: usize) -> Result<ExitCode> {
    let mut board = open_board(&cli.selection(), Accelerator::DramTest)
        .context("Failed to open board")?;
    println!("Board: {}", board.board_type());

    let mut rng = cli.rng();
    let passed = dram_suite::run(&mut board, &mut rng, cli.poll_config(), random_tests)?;
    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
