//! Metadata root.
//!
//! ```text
//! +0   Signature       0x424A5342 ("BSJB")
//! +4   MajorVersion
//! +6   MinorVersion
//! +8   Reserved
//! +12  Length          version string length, padded to 4
//! +16  Version         NUL-padded UTF-8
//! +16+Length  Flags    u16
//! +18+Length  Streams  u16, followed by the stream headers
//! ```
//!
//! # Reference
//! - [ECMA-335 II.24.2.1](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::parser::Parser, metadata::streams::StreamHeader, pe::constants::METADATA_SIGNATURE,
    Error::OutOfBounds, Result,
};

/// Longest version string the runtime accepts.
const MAX_VERSION_LENGTH: u32 = 255;

/// Decoded metadata root with its stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// `0x424A5342`
    pub signature: u32,
    /// Format major version
    pub major_version: u16,
    /// Format minor version
    pub minor_version: u16,
    /// Runtime version the image targets, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved
    pub flags: u16,
    /// Stream directory in stored order
    pub streams: Vec<StreamHeader>,
}

impl Root {
    /// Decodes the root and its stream headers.
    ///
    /// Streams whose range does not fit `data` are dropped with a warning.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a wrong signature or an oversized version
    /// string, [`crate::Error::OutOfBounds`] on truncation.
    pub fn read(data: &[u8]) -> Result<Root> {
        let mut parser = Parser::new(data);

        let signature = parser.read_le::<u32>()?;
        if signature != METADATA_SIGNATURE {
            return Err(malformed_error!(
                "metadata signature 0x{:08X} does not match",
                signature
            ));
        }

        let major_version = parser.read_le::<u16>()?;
        let minor_version = parser.read_le::<u16>()?;
        parser.advance_by(4)?;

        let length = parser.read_le::<u32>()?;
        if length > MAX_VERSION_LENGTH {
            return Err(malformed_error!("version string of {} bytes", length));
        }
        let raw = parser.read_bytes(length as usize)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let version = String::from_utf8_lossy(&raw[..end]).into_owned();
        parser.align(4)?;

        let flags = parser.read_le::<u16>()?;
        let count = parser.read_le::<u16>()?;

        let mut streams = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let stream = StreamHeader::read(&mut parser)?;
            let end = u64::from(stream.offset) + u64::from(stream.size);
            if end > data.len() as u64 {
                log::warn!(
                    "stream {} at 0x{:x}+0x{:x} exceeds the metadata",
                    stream.name,
                    stream.offset,
                    stream.size
                );
                continue;
            }
            streams.push(stream);
        }

        Ok(Root {
            signature,
            major_version,
            minor_version,
            version,
            flags,
            streams,
        })
    }

    /// Stream header by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.streams.iter().find(|stream| stream.name == name)
    }

    /// Bytes of the named stream within `data`, the buffer the root was read from.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is missing or does not fit.
    pub fn stream_data<'a>(&self, data: &'a [u8], name: &str) -> Result<&'a [u8]> {
        let stream = self.stream(name).ok_or(OutOfBounds)?;
        let start = stream.offset as usize;
        data.get(start..start + stream.size as usize)
            .ok_or(OutOfBounds)
    }

    /// The `#~` or `#-` stream header.
    #[must_use]
    pub fn tables_stream(&self) -> Option<&StreamHeader> {
        self.streams.iter().find(|stream| stream.is_tables())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const ROOT: [u8; 44] = [
        0x42, 0x53, 0x4A, 0x42,
        0x01, 0x00, 0x01, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x08, 0x00, 0x00, 0x00,
        b'v', b'4', b'.', b'0', 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00,
        0x28, 0x00, 0x00, 0x00, // #~ at 0x28
        0x08, 0x00, 0x00, 0x00,
        b'#', b'~', 0x00, 0x00,
        0xAA, 0xAA, 0xAA, 0xAA,
    ];

    #[test]
    fn crafted() {
        let mut data = ROOT.to_vec();
        data.extend_from_slice(&[0xBB; 4]);
        let root = Root::read(&data).unwrap();

        assert_eq!(root.version, "v4.0");
        assert_eq!(root.streams.len(), 1);
        assert!(root.tables_stream().is_some());
        assert_eq!(
            root.stream_data(&data, "#~").unwrap(),
            &[0xAA, 0xAA, 0xAA, 0xAA, 0xBB, 0xBB, 0xBB, 0xBB]
        );
        assert!(root.stream_data(&data, "#Strings").is_err());
    }

    #[test]
    fn out_of_range_stream_is_dropped() {
        let root = Root::read(&ROOT).unwrap();
        assert!(root.streams.is_empty());
    }

    #[test]
    fn bad_signature() {
        let mut data = ROOT.to_vec();
        data[0] = 0;
        assert!(Root::read(&data).is_err());
    }
}
