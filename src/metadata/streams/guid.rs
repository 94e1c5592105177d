//! `#GUID` heap.

use uguid::Guid;

use crate::{Error::OutOfBounds, Result};

/// View over the `#GUID` heap. Indexes are 1-based; 0 means no GUID.
#[derive(Debug, Clone, Copy)]
pub struct Guids<'a> {
    data: &'a [u8],
}

impl<'a> Guids<'a> {
    /// Wraps heap bytes.
    #[must_use]
    pub fn from(data: &'a [u8]) -> Guids<'a> {
        Guids { data }
    }

    /// GUID at the 1-based `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for index 0 or past the heap.
    pub fn get(&self, index: usize) -> Result<Guid> {
        let start = index.checked_sub(1).ok_or(OutOfBounds)? * 16;
        let bytes: [u8; 16] = self
            .data
            .get(start..start + 16)
            .ok_or(OutOfBounds)?
            .try_into()
            .map_err(|_| OutOfBounds)?;
        Ok(Guid::from_bytes(bytes))
    }

    /// Number of GUIDs in the heap.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        let mut heap: Vec<u8> = (1..=16).collect();
        heap.extend_from_slice(&[0xFF; 16]);
        let guids = Guids::from(&heap);

        assert_eq!(guids.count(), 2);
        assert_eq!(guids.get(1).unwrap().to_bytes().to_vec(), (1..=16).collect::<Vec<u8>>());
        assert_eq!(guids.get(2).unwrap().to_bytes(), [0xFF; 16]);
        assert!(guids.get(0).is_err());
        assert!(guids.get(3).is_err());
    }
}
