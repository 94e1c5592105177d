//! `#US` heap.

use crate::{file::parser::Parser, Result};

/// View over the `#US` heap.
///
/// Every entry is a compressed length followed by UTF-16LE code units and one trailing byte
/// flagging characters that need special handling.
#[derive(Debug, Clone, Copy)]
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Wraps heap bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty heap or a non-zero first byte.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("#US heap does not start with an empty entry"));
        }
        Ok(UserStrings { data })
    }

    /// String literal at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the entry runs past the heap.
    pub fn get(&self, index: usize) -> Result<String> {
        let mut parser = Parser::new(self.data);
        parser.seek(index)?;

        let length = parser.read_compressed_uint()? as usize;
        // odd lengths carry the terminal flag byte
        parser.read_utf16_units(length / 2)
    }

    /// Iterates `(index, string)` over all entries, stopping at the first undecodable one.
    pub fn iter(&self) -> impl Iterator<Item = (usize, String)> + 'a {
        let data = self.data;
        let mut position = 1;
        std::iter::from_fn(move || {
            let mut parser = Parser::new(data);
            parser.seek(position).ok()?;
            let length = parser.read_compressed_uint().ok()? as usize;
            if length == 0 {
                return None;
            }
            let value = parser.read_utf16_units(length / 2).ok()?;
            let index = position;
            position = parser.pos() + length % 2;
            Some((index, value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_iterate() {
        #[rustfmt::skip]
        let heap = [
            0x00,
            0x05, b'H', 0x00, b'i', 0x00, 0x00,
            0x03, b'!', 0x00, 0x01,
        ];
        let strings = UserStrings::from(&heap).unwrap();

        assert_eq!(strings.get(1).unwrap(), "Hi");
        assert_eq!(strings.get(7).unwrap(), "!");
        assert_eq!(
            strings.iter().collect::<Vec<_>>(),
            vec![(1, "Hi".to_string()), (7, "!".to_string())]
        );
        assert!(strings.get(20).is_err());
    }
}
