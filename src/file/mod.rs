//! Bounds-checked byte access over a finite backing store.
//!
//! Everything in this crate reads the underlying image through [`crate::file::File`], a thin
//! wrapper over a [`crate::file::Backend`]. The accessor offers random access to fixed-width
//! integers in either byte order, raw byte ranges, ANSI and UTF-16 strings at absolute offsets.
//! Out-of-range access never panics; it yields [`crate::Error::OutOfBounds`], which the
//! directory walkers treat as the sentinel ending the current chain.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - The byte accessor
//! - [`crate::file::Backend`] - Trait for data sources
//! - [`crate::file::Memory`] - Owned, writable and resizable buffer
//! - [`crate::file::Physical`] - Read-only memory-mapped file
//! - [`crate::file::parser::Parser`] - Sequential cursor for structure decoding
//! - [`crate::file::io`] - Endian-aware primitive helpers
//!
//! # Examples
//!
//! ```rust
//! use pescope::file::File;
//!
//! let file = File::from_mem(b"MZ\x90\x00KERNEL32.dll\x00".to_vec())?;
//! assert_eq!(file.read_u16(0, false)?, 0x5A4D);
//! assert_eq!(file.read_ansi_string(4, 64)?, "KERNEL32.dll");
//! # Ok::<(), pescope::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use std::path::Path;

use crate::{
    file::io::{read_be, read_le, write_be_at, write_le_at, PeIO},
    Error, Result,
};

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of the image bytes, allowing for both in-memory and
/// on-disk representations. Only [`Memory`] supports writing; the defaults of
/// [`Backend::data_mut`] and [`Backend::replace`] report [`Error::NotSupported`].
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;

    /// Returns the data buffer for in-place writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the backend is read-only.
    fn data_mut(&mut self) -> Result<&mut [u8]> {
        Err(Error::NotSupported)
    }

    /// Replaces the whole content of the backing store, possibly changing its length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the backend is read-only.
    fn replace(&mut self, _data: Vec<u8>) -> Result<()> {
        Err(Error::NotSupported)
    }
}

/// `data[offset..offset + len]`, or [`Error::OutOfBounds`] if any part lies outside.
fn bounded(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::OutOfBounds)
}

/// The byte accessor every parser in this crate reads through.
///
/// Offsets are absolute positions in the backing store. Multi-byte reads take a `big_endian`
/// flag; every PE structure is little-endian, the flag exists for DER and other big-endian
/// containers that share the accessor.
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
}

impl File {
    /// Memory-maps the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be opened, or [`Error::Empty`] if it has
    /// no content.
    pub fn from_file(path: &Path) -> Result<File> {
        let input = Physical::new(path)?;
        if input.len() == 0 {
            return Err(Error::Empty);
        }

        Ok(File {
            data: Box::new(input),
        })
    }

    /// Wraps an owned buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        Ok(File {
            data: Box::new(Memory::new(data)),
        })
    }

    /// Wraps a caller-provided backend.
    #[must_use]
    pub fn from_backend(backend: Box<dyn Backend>) -> File {
        File { data: backend }
    }

    /// Returns the size of the backing store in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the backing store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the whole backing store.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the range exceeds the backing store.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    fn slice_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let Ok(offset) = usize::try_from(offset) else {
            return Err(out_of_bounds_error!());
        };
        self.data.data_slice(offset, len)
    }

    fn read_value<T: PeIO>(&self, offset: u64, big_endian: bool) -> Result<T> {
        let bytes = self.slice_at(offset, std::mem::size_of::<T>())?;
        if big_endian {
            read_be(bytes)
        } else {
            read_le(bytes)
        }
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `offset` is past the end.
    pub fn read_u8(&self, offset: u64) -> Result<u8> {
        self.read_value(offset, false)
    }

    /// Reads a 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the read exceeds the backing store.
    pub fn read_u16(&self, offset: u64, big_endian: bool) -> Result<u16> {
        self.read_value(offset, big_endian)
    }

    /// Reads a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the read exceeds the backing store.
    pub fn read_u32(&self, offset: u64, big_endian: bool) -> Result<u32> {
        self.read_value(offset, big_endian)
    }

    /// Reads a 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the read exceeds the backing store.
    pub fn read_u64(&self, offset: u64, big_endian: bool) -> Result<u64> {
        self.read_value(offset, big_endian)
    }

    /// Reads a pointer-sized little-endian value: 8 bytes when `is_64`, 4 bytes otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the read exceeds the backing store.
    pub fn read_native(&self, offset: u64, is_64: bool) -> Result<u64> {
        if is_64 {
            self.read_u64(offset, false)
        } else {
            self.read_u32(offset, false).map(u64::from)
        }
    }

    /// Returns `size` raw bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the range exceeds the backing store.
    pub fn read_array(&self, offset: u64, size: usize) -> Result<&[u8]> {
        self.slice_at(offset, size)
    }

    /// Reads a NUL-terminated single-byte string of at most `max_len` bytes.
    ///
    /// A string running into the end of the backing store is truncated there. Bytes are mapped
    /// one-to-one onto the Latin-1 range so arbitrary input never fails to decode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `offset` itself is past the end.
    pub fn read_ansi_string(&self, offset: u64, max_len: usize) -> Result<String> {
        let available = self.len().saturating_sub(usize::try_from(offset).unwrap_or(usize::MAX));
        if available == 0 {
            return Err(out_of_bounds_error!());
        }

        let bytes = self.slice_at(offset, available.min(max_len))?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

        Ok(bytes[..end].iter().map(|&b| char::from(b)).collect())
    }

    /// Reads exactly `chars` UTF-16 code units, stopping early at a NUL unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the code units exceed the backing store.
    pub fn read_unicode_string(&self, offset: u64, chars: usize, big_endian: bool) -> Result<String> {
        let Some(byte_len) = chars.checked_mul(2) else {
            return Err(out_of_bounds_error!());
        };
        let bytes = self.slice_at(offset, byte_len)?;

        let units = bytes
            .chunks_exact(2)
            .map(|pair| {
                if big_endian {
                    u16::from_be_bytes([pair[0], pair[1]])
                } else {
                    u16::from_le_bytes([pair[0], pair[1]])
                }
            })
            .take_while(|&unit| unit != 0);

        Ok(widestring::decode_utf16_lossy(units).collect())
    }

    /// Returns `true` if the backend accepts writes.
    pub fn is_writable(&mut self) -> bool {
        self.data.data_mut().is_ok()
    }

    fn write_value<T: PeIO>(&mut self, offset: u64, value: T, big_endian: bool) -> Result<()> {
        let Ok(mut offset) = usize::try_from(offset) else {
            return Err(out_of_bounds_error!());
        };
        let data = self.data.data_mut()?;
        if big_endian {
            write_be_at(data, &mut offset, value)
        } else {
            write_le_at(data, &mut offset, value)
        }
    }

    /// Writes one byte in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for read-only backends or [`Error::OutOfBounds`].
    pub fn write_u8(&mut self, offset: u64, value: u8) -> Result<()> {
        self.write_value(offset, value, false)
    }

    /// Writes a 16-bit value in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for read-only backends or [`Error::OutOfBounds`].
    pub fn write_u16(&mut self, offset: u64, value: u16, big_endian: bool) -> Result<()> {
        self.write_value(offset, value, big_endian)
    }

    /// Writes a 32-bit value in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for read-only backends or [`Error::OutOfBounds`].
    pub fn write_u32(&mut self, offset: u64, value: u32, big_endian: bool) -> Result<()> {
        self.write_value(offset, value, big_endian)
    }

    /// Writes a 64-bit value in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for read-only backends or [`Error::OutOfBounds`].
    pub fn write_u64(&mut self, offset: u64, value: u64, big_endian: bool) -> Result<()> {
        self.write_value(offset, value, big_endian)
    }

    /// Copies `bytes` into the backing store at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for read-only backends or [`Error::OutOfBounds`].
    pub fn write_array(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let Ok(start) = usize::try_from(offset) else {
            return Err(out_of_bounds_error!());
        };
        let data = self.data.data_mut()?;
        let Some(end) = start.checked_add(bytes.len()) else {
            return Err(out_of_bounds_error!());
        };
        if end > data.len() {
            return Err(out_of_bounds_error!());
        }

        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Replaces the whole backing store in one step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] for read-only backends.
    pub fn replace(&mut self, data: Vec<u8>) -> Result<()> {
        self.data.replace(data)
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File").field("len", &self.len()).finish()
    }
}
