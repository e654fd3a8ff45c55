//! Word-safe host buffers.
//!
//! The board moves whole device words, so an array transfer of `n` elements
//! touches `ceil(n * size_of::<T>() / 4) * 4` bytes of host memory. A buffer
//! holding exactly `n` elements would be overrun by the trailing partial
//! word. [`SafeBuffer`] owns word-backed storage rounded up to that size,
//! so block transfers go straight to and from it without staging.

use crate::error::{ProcStarError, Result};
use bytemuck::Pod;
use procstar_chip::word::{words_for_elements, DeviceWord, WORD_BYTES};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// Smallest byte count that covers `element_count` elements and is a
/// whole number of device words.
///
/// Inputs are expected to lie within the device's addressable range; use
/// [`checked_safe_transfer_size`] for untrusted sizes.
#[must_use]
pub const fn safe_transfer_size(element_count: usize, bytes_per_element: usize) -> usize {
    words_for_elements(element_count, bytes_per_element) * WORD_BYTES
}

/// [`safe_transfer_size`] with overflow reported as a configuration error.
///
/// # Errors
///
/// Returns a configuration error if the byte count does not fit in `usize`.
pub fn checked_safe_transfer_size(element_count: usize, bytes_per_element: usize) -> Result<usize> {
    element_count
        .checked_mul(bytes_per_element)
        .and_then(|bytes| bytes.checked_add(WORD_BYTES - 1))
        .map(|bytes| bytes / WORD_BYTES * WORD_BYTES)
        .ok_or_else(|| {
            ProcStarError::configuration(format!(
                "transfer of {element_count} x {bytes_per_element} bytes overflows"
            ))
        })
}

/// Allocate a zeroed byte buffer rounded up to whole device words.
#[must_use]
pub fn safe_allocate(byte_count: usize) -> SafeBuffer<u8> {
    SafeBuffer::zeroed(byte_count)
}

/// Owned host buffer of `T` backed by whole device words.
///
/// `len()` is the logical element count; the storage behind it always spans
/// `safe_transfer_size(len, size_of::<T>())` bytes, zero-filled past the
/// last element. Dropping the buffer releases the storage.
#[derive(Clone)]
pub struct SafeBuffer<T> {
    words: Vec<DeviceWord>,
    len: usize,
    _elem: PhantomData<T>,
}

impl<T: Pod> SafeBuffer<T> {
    const LAYOUT_OK: () = assert!(
        std::mem::size_of::<T>() > 0
            && std::mem::align_of::<T>() <= std::mem::align_of::<DeviceWord>(),
        "SafeBuffer elements must be sized and no more aligned than a device word"
    );

    /// Zero-filled buffer of `len` elements.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        let () = Self::LAYOUT_OK;
        Self {
            words: vec![0; words_for_elements(len, std::mem::size_of::<T>())],
            len,
            _elem: PhantomData,
        }
    }

    /// Buffer holding a copy of `data`.
    #[must_use]
    pub fn from_slice(data: &[T]) -> Self {
        let mut buf = Self::zeroed(data.len());
        buf.as_mut_slice().copy_from_slice(data);
        buf
    }

    /// Logical element count.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of backing storage (a multiple of the device word size).
    #[must_use]
    pub fn storage_bytes(&self) -> usize {
        self.words.len() * WORD_BYTES
    }

    /// Backing storage as device words.
    #[must_use]
    pub fn words(&self) -> &[DeviceWord] {
        &self.words
    }

    /// Backing storage as device words, mutable.
    pub fn words_mut(&mut self) -> &mut [DeviceWord] {
        &mut self.words
    }

    /// Logical contents as bytes (excludes the word padding).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        &bytes[..self.len * std::mem::size_of::<T>()]
    }

    /// Logical contents.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        bytemuck::cast_slice(self.as_bytes())
    }

    /// Logical contents, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let n = self.len * std::mem::size_of::<T>();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
        bytemuck::cast_slice_mut(&mut bytes[..n])
    }

    /// Copy the logical contents out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

impl<T: Pod> Deref for SafeBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> DerefMut for SafeBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Pod + std::fmt::Debug> std::fmt::Debug for SafeBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeBuffer")
            .field("len", &self.len)
            .field("storage_bytes", &self.storage_bytes())
            .finish()
    }
}
