//! `#Strings` heap.

use crate::{Error::OutOfBounds, Result};

/// View over the `#Strings` heap.
///
/// # Examples
///
/// ```rust
/// use pescope::metadata::streams::Strings;
///
/// let heap = Strings::from(b"\0Program\0Main\0")?;
/// assert_eq!(heap.get(1)?, "Program");
/// assert_eq!(heap.get(9)?, "Main");
/// # Ok::<(), pescope::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wraps heap bytes, which must start with the empty string.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty heap or a non-zero first byte.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("#Strings heap does not start with an empty string"));
        }
        Ok(Strings { data })
    }

    /// Identifier at `index`, invalid UTF-8 replaced.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an index past the heap.
    pub fn get(&self, index: usize) -> Result<String> {
        let rest = self.data.get(index..).ok_or(OutOfBounds)?;
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
    }

    /// Heap size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the heap only holds the empty string.
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
        let heap = Strings::from(b"\0<Module>\0System.Console\0WriteLine").unwrap();

        assert_eq!(heap.get(0).unwrap(), "");
        assert_eq!(heap.get(1).unwrap(), "<Module>");
        assert_eq!(heap.get(10).unwrap(), "System.Console");
        // suffix sharing lands in the middle of an entry
        assert_eq!(heap.get(17).unwrap(), "Console");
        // a missing terminator reads to the end of the heap
        assert_eq!(heap.get(25).unwrap(), "WriteLine");
        assert!(heap.get(100).is_err());
    }

    #[test]
    fn invalid_heap() {
        assert!(Strings::from(&[]).is_err());
        assert!(Strings::from(b"A\0").is_err());
    }
}
