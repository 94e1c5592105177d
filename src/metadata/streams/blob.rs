//! `#Blob` heap.

use crate::{file::parser::Parser, Result};

/// View over the `#Blob` heap: compressed length followed by the payload.
#[derive(Debug, Clone, Copy)]
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Wraps heap bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty heap or a non-zero first byte.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("#Blob heap does not start with an empty blob"));
        }
        Ok(Blob { data })
    }

    /// Blob payload at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the blob runs past the heap.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        let mut parser = Parser::new(self.data);
        parser.seek(index)?;
        let length = parser.read_compressed_uint()? as usize;
        parser.read_bytes(length)
    }

    /// Heap size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the heap only holds the empty blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        let mut heap = vec![0x00, 0x03, 0xAA, 0xBB, 0xCC];
        // two-byte length prefix, 0x81 bytes
        heap.extend_from_slice(&[0x80, 0x81]);
        heap.extend(std::iter::repeat(0x7F).take(0x81));
        let blob = Blob::from(&heap).unwrap();

        assert_eq!(blob.get(0).unwrap(), &[] as &[u8]);
        assert_eq!(blob.get(1).unwrap(), &[0xAA, 0xBB, 0xCC]);
        assert_eq!(blob.get(5).unwrap().len(), 0x81);
        assert!(blob.get(2).is_err());
    }
}
