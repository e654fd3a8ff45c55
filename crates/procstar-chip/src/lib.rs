//! Silicon model for the PROCStar accelerator wrappers.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the fixed hardware contract the host software must match
//! bit for bit: word geometry, the RAM window layout, the DMA window
//! encoding and the top-of-map register offsets of each accelerator.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`word`] | Device word / application word widths, word rounding |
//! | [`ram`] | RAM window geometry and the DMA window config word |
//! | [`regs`] | Memory-map width and per-accelerator register offsets |
//!
//! # Memory map
//!
//! ```text
//! word address
//! 0x00000 ┌──────────────────────────────┐
//!         │ MEM_IN / MEM_OUT data port   │  block transfers (DMA window)
//!         │            ...               │
//! top-8   ├──────────────────────────────┤
//!         │ 8 accelerator registers      │  config / go / rst / done ...
//! top-1   └──────────────────────────────┘
//! top = 1 << MMAP_ADDR_WIDTH
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ram;
pub mod regs;
pub mod word;

pub use ram::DmaWindow;
pub use word::{AppWord, DeviceWord, APP_WORD_BYTES, WORD_BYTES};
