//! Metadata streams.
//!
//! The metadata root lists its streams by name; each [`StreamHeader`] gives the offset and size
//! of one stream relative to the root. The four heaps are exposed as borrowed views:
//!
//! - [`Strings`] (`#Strings`): NUL-terminated UTF-8 identifiers
//! - [`UserStrings`] (`#US`): length-prefixed UTF-16 literals
//! - [`Blob`] (`#Blob`): length-prefixed binary signatures and values
//! - [`Guids`] (`#GUID`): 16-byte GUIDs addressed by 1-based index
//!
//! The tables stream (`#~`) lives in [`crate::metadata::tables`].
//!
//! # Reference
//! - [ECMA-335 II.24.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod blob;
mod guid;
mod strings;
mod userstrings;

pub use blob::Blob;
pub use guid::Guids;
pub use strings::Strings;
pub use userstrings::UserStrings;

use crate::{file::parser::Parser, Result};

/// Longest stream name including its terminator.
const MAX_STREAM_NAME: usize = 32;

/// One entry of the metadata root's stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset from the start of the metadata root
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
    /// Stream name, e.g. `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Reads one header and leaves the parser on the next 4-byte boundary.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`] for
    /// a name without terminator within 32 bytes.
    pub fn read(parser: &mut Parser) -> Result<StreamHeader> {
        let offset = parser.read_le::<u32>()?;
        let size = parser.read_le::<u32>()?;

        let start = parser.pos();
        let mut name = String::new();
        loop {
            let byte = parser.read_le::<u8>()?;
            if byte == 0 {
                break;
            }
            if parser.pos() - start >= MAX_STREAM_NAME {
                return Err(malformed_error!("stream name exceeds 32 bytes"));
            }
            name.push(char::from(byte));
        }
        parser.align(4)?;

        Ok(StreamHeader { offset, size, name })
    }

    /// Returns `true` for the compressed (`#~`) or uncompressed (`#-`) tables stream.
    #[must_use]
    pub fn is_tables(&self) -> bool {
        self.name == "#~" || self.name == "#-"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            b'#', b'~', 0x00, 0x00,
            0x10, 0x46, 0x00, 0x00,
            0x10, 0x00, 0x00, 0x00,
            b'#', b'U', b'S', 0x00,
        ];
        let mut parser = Parser::new(&bytes);

        let tables = StreamHeader::read(&mut parser).unwrap();
        assert_eq!(tables.offset, 0x6C);
        assert_eq!(tables.size, 0x45A4);
        assert!(tables.is_tables());
        assert_eq!(parser.pos(), 12);

        let user_strings = StreamHeader::read(&mut parser).unwrap();
        assert_eq!(user_strings.name, "#US");
        assert_eq!(parser.pos(), 24);
    }

    #[test]
    fn unterminated_name() {
        let mut bytes = vec![0u8; 8];
        bytes.extend_from_slice(&[b'A'; 40]);
        assert!(StreamHeader::read(&mut Parser::new(&bytes)).is_err());
    }
}
