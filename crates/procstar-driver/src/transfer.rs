//! Typed transfers over a word-addressed board.
//!
//! Scalars stage through a temporary word buffer, because `size_of::<T>()`
//! need not be a multiple of the device word and the caller's value is not
//! over-allocated. Arrays go straight to and from a [`SafeBuffer`], whose
//! storage is already rounded up to whole words. Word counts always round
//! up; the trailing bytes of the last word are don't-care on the device.

use crate::board::Board;
use crate::error::{ErrorKind, ProcStarError, Result};
use crate::sizing::SafeBuffer;
use bytemuck::Pod;
use procstar_chip::word::{words_for_bytes, words_for_elements, DeviceWord};
use tracing::trace;

/// Typed read/write access to one board.
///
/// Holds the board exclusively for its lifetime; no two protocol runs can
/// interleave on the same handle.
#[derive(Debug)]
pub struct TransferLayer<'a, B: Board + ?Sized> {
    board: &'a mut B,
}

impl<'a, B: Board + ?Sized> TransferLayer<'a, B> {
    /// Wrap a board.
    pub fn new(board: &'a mut B) -> Self {
        Self { board }
    }

    /// Underlying board.
    pub fn board(&mut self) -> &mut B {
        &mut *self.board
    }

    /// Read one `T` from word address `addr`.
    ///
    /// # Errors
    ///
    /// Returns a transfer error if the board read fails.
    pub fn read_scalar<T: Pod>(&mut self, addr: u32) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let mut temp: Vec<DeviceWord> = vec![0; words_for_bytes(size)];
        self.board
            .read_words(addr, &mut temp)
            .map_err(|e| transport_error("read", addr, temp.len(), e))?;
        let bytes: &[u8] = bytemuck::cast_slice(&temp);
        let value = bytemuck::pod_read_unaligned(&bytes[..size]);
        trace!("read {size}B @ {addr:#x}");
        Ok(value)
    }

    /// Write one `T` to word address `addr`.
    ///
    /// # Errors
    ///
    /// Returns a transfer error if the board write fails.
    pub fn write_scalar<T: Pod>(&mut self, value: T, addr: u32) -> Result<()> {
        let src = bytemuck::bytes_of(&value);
        let mut temp: Vec<DeviceWord> = vec![0; words_for_bytes(src.len())];
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut temp);
        dst[..src.len()].copy_from_slice(src);
        trace!("write {}B @ {addr:#x}", src.len());
        self.board
            .write_words(addr, &temp)
            .map_err(|e| transport_error("write", addr, temp.len(), e))
    }

    /// Read `count` elements from `addr` into the front of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `buffer` holds fewer words than the
    /// transfer, or a transfer error if the board read fails.
    pub fn read_array<T: Pod>(
        &mut self,
        buffer: &mut SafeBuffer<T>,
        addr: u32,
        count: usize,
    ) -> Result<()> {
        let n = words_for_elements(count, std::mem::size_of::<T>());
        let available = buffer.words().len();
        let words = buffer
            .words_mut()
            .get_mut(..n)
            .ok_or(ProcStarError::BufferTooSmall { needed: n, available })?;
        trace!("read {count} elements ({n} words) @ {addr:#x}");
        self.board
            .read_words(addr, words)
            .map_err(|e| transport_error("read", addr, n, e))
    }

    /// Write the first `count` elements of `buffer` to `addr`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `buffer` holds fewer words than the
    /// transfer, or a transfer error if the board write fails.
    pub fn write_array<T: Pod>(
        &mut self,
        buffer: &SafeBuffer<T>,
        addr: u32,
        count: usize,
    ) -> Result<()> {
        let n = words_for_elements(count, std::mem::size_of::<T>());
        let available = buffer.words().len();
        let words = buffer
            .words()
            .get(..n)
            .ok_or(ProcStarError::BufferTooSmall { needed: n, available })?;
        trace!("write {count} elements ({n} words) @ {addr:#x}");
        self.board
            .write_words(addr, words)
            .map_err(|e| transport_error("write", addr, n, e))
    }

    /// Push `values` one at a time into the FIFO port at `port`.
    ///
    /// Each value is a separate scalar write to the same address; the port
    /// has no address semantics beyond that.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failed write.
    pub fn write_stream<T: Pod>(&mut self, values: &[T], port: u32) -> Result<()> {
        for &value in values {
            self.write_scalar(value, port)?;
        }
        Ok(())
    }
}

fn transport_error(op: &str, addr: u32, words: usize, err: ProcStarError) -> ProcStarError {
    if err.kind() == ErrorKind::Transfer {
        err
    } else {
        ProcStarError::transfer_failed(format!("{op} of {words} words @ {addr:#x}: {err}"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::board::BoardType;
    use std::collections::BTreeMap;

    /// Sparse word memory that logs every access.
    #[derive(Debug, Default)]
    pub(crate) struct MemBoard {
        pub mem: BTreeMap<u32, DeviceWord>,
        pub writes: Vec<(u32, Vec<DeviceWord>)>,
        pub fail: bool,
    }

    impl Board for MemBoard {
        fn read_words(&mut self, addr: u32, buffer: &mut [DeviceWord]) -> Result<()> {
            if self.fail {
                return Err(ProcStarError::transfer_failed("injected"));
            }
            for (i, w) in buffer.iter_mut().enumerate() {
                *w = self.mem.get(&(addr + i as u32)).copied().unwrap_or(0);
            }
            Ok(())
        }

        fn write_words(&mut self, addr: u32, data: &[DeviceWord]) -> Result<()> {
            if self.fail {
                return Err(ProcStarError::Io {
                    source: std::io::Error::other("injected"),
                });
            }
            for (i, w) in data.iter().enumerate() {
                self.mem.insert(addr + i as u32, *w);
            }
            self.writes.push((addr, data.to_vec()));
            Ok(())
        }

        fn board_type(&self) -> BoardType {
            BoardType::SimConvolve
        }
    }

    #[test]
    fn scalar_u16_moves_one_word() {
        let mut board = MemBoard::default();
        let mut t = TransferLayer::new(&mut board);
        t.write_scalar(0xBEEFu16, 7).unwrap();
        assert_eq!(t.read_scalar::<u16>(7).unwrap(), 0xBEEF);
        assert_eq!(board.writes, vec![(7, vec![0x0000_BEEF])]);
    }

    #[test]
    fn scalar_u64_moves_two_words() {
        let mut board = MemBoard::default();
        let mut t = TransferLayer::new(&mut board);
        t.write_scalar(0x0123_4567_89AB_CDEFu64, 10).unwrap();
        assert_eq!(t.read_scalar::<u64>(10).unwrap(), 0x0123_4567_89AB_CDEF);
        assert_eq!(board.writes[0].1.len(), 2);
    }

    #[test]
    fn scalar_read_takes_leading_bytes() {
        let mut board = MemBoard::default();
        board.mem.insert(3, 0xFFFF_0001);
        let mut t = TransferLayer::new(&mut board);
        assert_eq!(t.read_scalar::<u8>(3).unwrap(), 1);
        assert_eq!(t.read_scalar::<u16>(3).unwrap(), 1);
    }

    #[test]
    fn array_rounds_word_count_up() {
        let mut board = MemBoard::default();
        let buf = SafeBuffer::<u16>::from_slice(&[1, 2, 3]);
        TransferLayer::new(&mut board)
            .write_array(&buf, 0, 3)
            .unwrap();
        assert_eq!(board.writes[0].1.len(), 2);

        let mut out = SafeBuffer::<u16>::zeroed(3);
        TransferLayer::new(&mut board)
            .read_array(&mut out, 0, 3)
            .unwrap();
        assert_eq!(out.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn array_shorter_count_leaves_tail() {
        let mut board = MemBoard::default();
        board.mem.insert(0, 0x0002_0001);
        let mut out = SafeBuffer::<u16>::from_slice(&[9, 9, 9, 9]);
        TransferLayer::new(&mut board)
            .read_array(&mut out, 0, 2)
            .unwrap();
        assert_eq!(out.as_slice(), &[1, 2, 9, 9]);
    }

    #[test]
    fn array_rejects_undersized_buffer() {
        let mut board = MemBoard::default();
        let mut out = SafeBuffer::<u16>::zeroed(2);
        let err = TransferLayer::new(&mut board)
            .read_array(&mut out, 0, 3)
            .unwrap_err();
        assert!(matches!(
            err,
            ProcStarError::BufferTooSmall {
                needed: 2,
                available: 1
            }
        ));
        assert!(board.writes.is_empty());
    }

    #[test]
    fn stream_writes_each_value_to_same_port() {
        let mut board = MemBoard::default();
        TransferLayer::new(&mut board)
            .write_stream(&[5u32, 6, 7], 42)
            .unwrap();
        assert_eq!(
            board.writes,
            vec![(42, vec![5]), (42, vec![6]), (42, vec![7])]
        );
    }

    #[test]
    fn transport_failures_are_transfer_errors() {
        let mut board = MemBoard {
            fail: true,
            ..MemBoard::default()
        };
        let mut t = TransferLayer::new(&mut board);
        assert_eq!(
            t.read_scalar::<u32>(0).unwrap_err().kind(),
            ErrorKind::Transfer
        );
        assert_eq!(
            t.write_scalar(1u32, 0).unwrap_err().kind(),
            ErrorKind::Transfer
        );
    }
}
