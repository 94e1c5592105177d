//! Low-level byte order and safe reading/writing utilities for PE parsing.
//!
//! This module provides endian-aware, bounds-checked primitives for reading and writing fixed
//! width integers from/to byte buffers. Every PE structure in this crate is decoded field by
//! field through these helpers instead of overlaying `#[repr(C)]` structs on the raw bytes,
//! which keeps the parsers independent of the host byte order and of struct packing.
//!
//! # Key Components
//!
//! - [`crate::file::io::PeIO`] - Trait defining endian-aware conversions for primitive integers
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Little-endian reads
//! - [`crate::file::io::read_be`] / [`crate::file::io::read_be_at`] - Big-endian reads (DER)
//! - [`crate::file::io::write_le`] / [`crate::file::io::write_le_at`] - Little-endian writes
//! - [`crate::file::io::read_le_at_dyn`] - 2- or 4-byte index reads used by metadata tables
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::file::io::{read_le, read_be, write_le};
//!
//! let data = [0x01, 0x00, 0x00, 0x00];
//! let value: u32 = read_le(&data)?;
//! assert_eq!(value, 1);
//!
//! let value: u32 = read_be(&data)?;
//! assert_eq!(value, 0x0100_0000);
//!
//! let mut buffer = [0u8; 2];
//! write_le(&mut buffer, 0x5A4D_u16)?;
//! assert_eq!(&buffer, b"MZ");
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for endian-aware conversion of fixed width integers.
///
/// Implemented for the signed and unsigned integer types used by PE structures.
pub trait PeIO: Sized {
    /// Byte array representation of this type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Decode from big-endian bytes
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Encode to little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
    /// Encode to big-endian bytes
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_pe_io {
    ($($ty:ty),*) => {
        $(
            impl PeIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_pe_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: PeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a little-endian value at `offset`, advancing `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Reads either a 2-byte or a 4-byte little-endian index, widened to `u32`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Safely reads a value of type `T` in big-endian byte order from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be<T: PeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a big-endian value at `offset`, advancing `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

/// Writes `value` in little-endian byte order to the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn write_le<T: PeIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Writes `value` in little-endian byte order at `offset`, advancing `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn write_le_at<T: PeIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let bytes = value.to_le_bytes();
    data[*offset..end].copy_from_slice(bytes.as_ref());
    *offset = end;

    Ok(())
}

/// Writes `value` in big-endian byte order at `offset`, advancing `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn write_be_at<T: PeIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let bytes = value.to_be_bytes();
    data[*offset..end].copy_from_slice(bytes.as_ref());
    *offset = end;

    Ok(())
}

/// Writes an unsigned value using `width` little-endian bytes (1, 2, 4 or 8).
///
/// Used by layout-driven writers where the field width depends on the image bitness.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small, or
/// [`crate::Error::Malformed`] for an unsupported width.
#[allow(clippy::cast_possible_truncation)]
pub fn write_le_sized(data: &mut [u8], offset: usize, width: u8, value: u64) -> Result<()> {
    let mut offset = offset;
    match width {
        1 => write_le_at::<u8>(data, &mut offset, value as u8),
        2 => write_le_at::<u16>(data, &mut offset, value as u16),
        4 => write_le_at::<u32>(data, &mut offset, value as u32),
        8 => write_le_at::<u64>(data, &mut offset, value),
        _ => Err(malformed_error!("Unsupported field width - {}", width)),
    }
}

/// Reads an unsigned value stored in `width` little-endian bytes (1, 2, 4 or 8).
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes, or
/// [`crate::Error::Malformed`] for an unsupported width.
pub fn read_le_sized(data: &[u8], offset: usize, width: u8) -> Result<u64> {
    let mut offset = offset;
    match width {
        1 => Ok(u64::from(read_le_at::<u8>(data, &mut offset)?)),
        2 => Ok(u64::from(read_le_at::<u16>(data, &mut offset)?)),
        4 => Ok(u64::from(read_le_at::<u32>(data, &mut offset)?)),
        8 => read_le_at::<u64>(data, &mut offset),
        _ => Err(malformed_error!("Unsupported field width - {}", width)),
    }
}
