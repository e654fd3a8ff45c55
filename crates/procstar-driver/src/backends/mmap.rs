//! Memory-mapped board
//!
//! Maps the PCI BAR that exposes the accelerator memory map and performs
//! volatile 32-bit accesses on it. Word address `n` lives at byte offset
//! `4 * n` of the BAR.
//!
//! Bitstream programming and clock setup are not handled here; the board
//! must already carry a configured wrapper.

use crate::board::{Board, BoardType};
use crate::error::{ProcStarError, Result};
use procstar_chip::word::WORD_BYTES;
use procstar_chip::DeviceWord;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::Path;
use std::ptr::NonNull;

/// Memory-mapped PCIe BAR carrying the accelerator memory map
#[derive(Debug)]
pub struct MmapBoard {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    label: String,
}

impl MmapBoard {
    /// Map BAR `bar_index` of the PCI device at `pcie_address`.
    ///
    /// # Errors
    ///
    /// Returns error if the resource file is missing, cannot be opened, is
    /// empty, or cannot be mapped.
    pub fn open(pcie_address: &str, bar_index: usize) -> Result<Self> {
        let path = format!("/sys/bus/pci/devices/{pcie_address}/resource{bar_index}");
        Self::open_path(path)
    }

    /// Map an arbitrary resource file (sysfs BAR, UIO map, ...).
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, cannot be opened, is empty, or
    /// cannot be mapped.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProcStarError::board_not_found(path));
        }

        tracing::debug!("Mapping board memory: {}", path.display());

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        // Truncation acceptable: BAR sizes fit in usize on 64-bit hosts
        #[allow(clippy::cast_possible_truncation)]
        let size = file.metadata()?.len() as usize;

        if size == 0 {
            return Err(ProcStarError::invalid_state(format!(
                "{} has size 0 (device not enabled?)",
                path.display()
            )));
        }

        // SAFETY: mmap of a device resource file.
        // - fd is valid (just opened) and kept open in `_file` for the mapping's lifetime
        // - size is non-zero (checked above)
        // - MAP_SHARED with READ|WRITE is what MMIO needs
        // - the mapping is released exactly once in Drop
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
            .map_err(|e| ProcStarError::invalid_state(format!("mmap failed: {e}")))?
        };
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| ProcStarError::invalid_state("mmap returned null"))?;

        tracing::info!("Mapped {} ({} KB at {ptr:p})", path.display(), size / 1024);

        Ok(Self {
            ptr,
            size,
            _file: file,
            label: path.display().to_string(),
        })
    }

    /// Mapped size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    fn check_bounds(&self, op: &str, addr: u32, words: usize) -> Result<usize> {
        let offset = addr as usize * WORD_BYTES;
        if offset + words * WORD_BYTES > self.size {
            return Err(ProcStarError::transfer_failed(format!(
                "Out of bounds {op}: word {addr:#x} x {words}, limit={:#x} bytes",
                self.size
            )));
        }
        Ok(offset)
    }
}

impl Board for MmapBoard {
    fn read_words(&mut self, addr: u32, buffer: &mut [DeviceWord]) -> Result<()> {
        let offset = self.check_bounds("read", addr, buffer.len())?;
        for (i, word) in buffer.iter_mut().enumerate() {
            // SAFETY: volatile read from the mapped BAR.
            // - offset + 4 * len <= size (checked above), so every word is in the mapping
            // - the BAR base is page aligned and offsets are multiples of 4
            // - volatile keeps the compiler from merging or reordering device reads
            #[allow(clippy::cast_ptr_alignment)]
            unsafe {
                let p = self.ptr.as_ptr().add(offset + i * WORD_BYTES);
                *word = p.cast::<DeviceWord>().read_volatile();
            }
        }
        tracing::trace!("{}: read {} words @ {addr:#x}", self.label, buffer.len());
        Ok(())
    }

    fn write_words(&mut self, addr: u32, data: &[DeviceWord]) -> Result<()> {
        let offset = self.check_bounds("write", addr, data.len())?;
        tracing::trace!("{}: write {} words @ {addr:#x}", self.label, data.len());
        for (i, &word) in data.iter().enumerate() {
            // SAFETY: volatile write to the mapped BAR; same bounds and alignment
            // argument as read_words. Register writes have side effects (GO, RST,
            // FIFO ports), so each must reach the device in program order.
            #[allow(clippy::cast_ptr_alignment)]
            unsafe {
                let p = self.ptr.as_ptr().add(offset + i * WORD_BYTES);
                p.cast::<DeviceWord>().write_volatile(word);
            }
        }
        Ok(())
    }

    fn board_type(&self) -> BoardType {
        BoardType::Mmap
    }
}

impl Drop for MmapBoard {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {}", self.label);

        // SAFETY: ptr/size are exactly what mmap returned in open_path, and
        // Drop runs at most once.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: MmapBoard owns its mapping exclusively; moving it between threads
// does not invalidate the mapping, and all access goes through &mut self.
unsafe impl Send for MmapBoard {}
