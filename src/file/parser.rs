//! Cursor-based byte stream parser for sequential PE structure decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over a
//! byte slice. Directory walkers use it whenever a structure is read field after field (import
//! descriptors, resource directories, version blocks, metadata stream headers) instead of
//! computing every absolute offset by hand.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser::seek`] / [`crate::file::parser::Parser::advance_by`] /
//!   [`crate::file::parser::Parser::align`] - Navigation
//! - [`crate::file::parser::Parser::read_le`] / [`crate::file::parser::Parser::read_be`] -
//!   Primitive reads
//! - [`crate::file::parser::Parser::read_compressed_uint`] - ECMA-335 compressed lengths used by
//!   the `#US` and `#Blob` heaps
//! - [`crate::file::parser::Parser::read_string_utf8`] - NUL-terminated strings
//! - [`crate::file::parser::Parser::read_utf16_units`] - Fixed-count UTF-16 strings
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let mut parser = Parser::new(&data);
//!
//! let first = parser.read_le::<u32>()?;
//! assert_eq!(first, 0x04030201);
//!
//! parser.seek(6)?;
//! assert_eq!(parser.read_le::<u16>()?, 0x0807);
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, read_le_at, PeIO},
    Result,
};

/// A bounds-checked cursor over a byte slice.
///
/// The parser never panics on truncated input: every read validates that enough bytes remain
/// and returns [`crate::Error::OutOfBounds`] otherwise, leaving the cursor untouched.
///
/// # Examples
///
/// ```rust
/// use pescope::Parser;
///
/// let data = [b'K', b'E', b'Y', 0x00, 0x2A];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_string_utf8()?, "KEY");
/// assert_eq!(parser.read_le::<u8>()?, 42);
/// assert!(!parser.has_more_data());
/// # Ok::<(), pescope::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying data buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if the cursor has not yet reached the end of the buffer.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to exactly `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the new position would be past the end.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let Some(target) = self.position.checked_add(step) else {
            return Err(out_of_bounds_error!());
        };
        self.seek(target)
    }

    /// Returns the current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns the complete underlying buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the number of bytes left after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Align the cursor up to the next multiple of `alignment`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the aligned position is past the end.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        if alignment <= 1 {
            return Ok(());
        }

        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Peek at the next byte without moving the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the parser is exhausted.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(out_of_bounds_error!())
    }

    /// Read a little-endian value and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_le<T: PeIO>(&mut self) -> Result<T> {
        read_le_at(self.data, &mut self.position)
    }

    /// Read a big-endian value and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_be<T: PeIO>(&mut self) -> Result<T> {
        read_be_at(self.data, &mut self.position)
    }

    /// Read `length` raw bytes and advance the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let Some(end) = self.position.checked_add(length) else {
            return Err(out_of_bounds_error!());
        };
        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// Used for the length prefixes of the `#US` and `#Blob` metadata heaps.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for an invalid leading byte.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pescope::Parser;
    ///
    /// let mut parser = Parser::new(&[0x80, 0x80]);
    /// assert_eq!(parser.read_compressed_uint()?, 128);
    /// # Ok::<(), pescope::Error>(())
    /// ```
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        // 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            return Ok(((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a NUL-terminated UTF-8 string and advance past the terminator.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected. A missing terminator reads
    /// up to the end of the buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the parser is already exhausted.
    pub fn read_string_utf8(&mut self) -> Result<String> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let rest = &self.data[self.position..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();

        self.position += (end + 1).min(rest.len());
        Ok(value)
    }

    /// Read exactly `count` UTF-16LE code units as a string.
    ///
    /// Unpaired surrogates are replaced rather than rejected.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_utf16_units(&mut self, count: usize) -> Result<String> {
        let Some(byte_len) = count.checked_mul(2) else {
            return Err(out_of_bounds_error!());
        };
        let bytes = self.read_bytes(byte_len)?;

        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(String::from_utf16_lossy(&units))
    }

    /// Read a NUL-terminated UTF-16LE string and advance past the terminator.
    ///
    /// Reading stops at the terminator, at the end of the buffer, or after `max_units` code
    /// units, whichever comes first.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the parser is already exhausted.
    pub fn read_utf16_terminated(&mut self, max_units: usize) -> Result<String> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let mut units = Vec::new();
        while units.len() < max_units {
            let Ok(unit) = self.read_le::<u16>() else {
                break;
            };
            if unit == 0 {
                break;
            }
            units.push(unit);
        }

        Ok(widestring::decode_utf16_lossy(units).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_compressed_uint() {
        let test_cases = vec![
            (vec![0x03], 3),
            (vec![0x7F], 0x7F),
            (vec![0x80, 0x80], 0x80),
            (vec![0xBF, 0xFF], 0x3FFF),
            (vec![0xC0, 0x00, 0x00, 0x00], 0x00),
            (vec![0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_uint().unwrap(), expected);
        }

        let mut parser = Parser::new(&[]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::OutOfBounds)
        ));

        let mut parser = Parser::new(&[0xFF]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_navigation() {
        let data = [0u8; 10];
        let mut parser = Parser::new(&data);

        parser.advance_by(3).unwrap();
        assert_eq!(parser.pos(), 3);

        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);

        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);

        parser.seek(10).unwrap();
        assert!(!parser.has_more_data());
        assert_eq!(parser.remaining(), 0);

        assert!(parser.seek(11).is_err());
        assert!(parser.advance_by(usize::MAX).is_err());
        assert!(parser.peek_byte().is_err());
    }

    #[test]
    fn test_read_bytes() {
        let data = [1, 2, 3, 4];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_bytes(3).unwrap(), &[1, 2, 3]);
        assert!(parser.read_bytes(2).is_err());
        assert_eq!(parser.pos(), 3);
    }

    #[test]
    fn test_read_string_utf8() {
        let data = b"KERNEL32.dll\0ExitProcess";
        let mut parser = Parser::new(data);

        assert_eq!(parser.read_string_utf8().unwrap(), "KERNEL32.dll");
        // unterminated tail still yields its content
        assert_eq!(parser.read_string_utf8().unwrap(), "ExitProcess");
        assert!(parser.read_string_utf8().is_err());
    }

    #[test]
    fn test_read_utf16() {
        let data = [b'H', 0, b'i', 0, 0, 0, b'!', 0];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_utf16_units(2).unwrap(), "Hi");

        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_utf16_terminated(64).unwrap(), "Hi");
        assert_eq!(parser.pos(), 6);

        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_utf16_terminated(1).unwrap(), "H");

        let mut parser = Parser::new(&data);
        assert!(parser.read_utf16_units(5).is_err());
    }
}
