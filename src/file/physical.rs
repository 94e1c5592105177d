//! Physical file backend for memory-mapped I/O.
//!
//! This module provides the [`crate::file::physical::Physical`] backend that implements the
//! [`crate::file::Backend`] trait for files on disk. The file is mapped read-only into the
//! process address space, so large samples can be inspected without reading them upfront.
//!
//! Mapped files are never written through: the mutation engine reports
//! [`crate::Error::NotSupported`] for this backend. Load the bytes with
//! [`crate::PeFile::from_mem`] when a rewritten image is needed.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pescope::file::{Backend, Physical};
//! use std::path::Path;
//!
//! let physical = Physical::new(Path::new("sample.exe"))?;
//! let dos_magic = physical.data_slice(0, 2)?;
//! assert_eq!(dos_magic, b"MZ");
//! # Ok::<(), pescope::Error>(())
//! ```

use super::{bounded, Backend};
use crate::{Error::FileError, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A read-only file backend that uses memory-mapped I/O.
///
/// All access operations include bounds checking. The mapping stays alive for as long as the
/// backend does.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Create a new physical file backend by memory-mapping the specified file.
    ///
    /// # Arguments
    /// * `path` - Path to the file on disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        Self::from_std_file(&fs::File::open(path).map_err(FileError)?)
    }

    /// Creates a new physical file backend from an opened [`std::fs::File`].
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if memory mapping fails.
    pub fn from_std_file(file: &fs::File) -> Result<Physical> {
        // The mapping is read-only; concurrent truncation by another process is outside our control.
        let mmap = unsafe { Mmap::map(file) }.map_err(FileError)?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        bounded(&self.data, offset, len)
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn physical() {
        let mut content = vec![0u8; 4096];
        content[0] = b'M';
        content[1] = b'Z';
        content[12..17].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00, 0xB8]);
        let file = temp_file(&content);

        let physical = Physical::new(file.path()).unwrap();

        assert_eq!(physical.len(), 4096);
        assert_eq!(physical.data()[0], 0x4D);
        assert_eq!(physical.data()[1], 0x5A);
        assert_eq!(
            physical.data_slice(12, 5).unwrap(),
            &[0xFF, 0xFF, 0x00, 0x00, 0xB8]
        );

        assert!(physical.data_slice(usize::MAX, 1).is_err());
        assert!(physical.data_slice(4096, 1).is_err());
        assert!(physical.data_slice(4095, 2).is_err());
        assert_eq!(physical.data_slice(4096, 0).unwrap().len(), 0);
    }

    #[test]
    fn physical_is_read_only() {
        let file = temp_file(&[1, 2, 3, 4]);
        let mut physical = Physical::new(file.path()).unwrap();

        assert!(matches!(
            physical.data_mut(),
            Err(crate::Error::NotSupported)
        ));
        assert!(matches!(
            physical.replace(vec![0]),
            Err(crate::Error::NotSupported)
        ));
        assert_eq!(physical.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn physical_invalid_file_path() {
        let result = Physical::new("/nonexistent/path/to/file.exe");
        match result {
            Err(FileError(io_error)) => {
                assert_eq!(io_error.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected FileError"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn physical_unmappable_handle() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fs::File::open(dir.path()).unwrap();

        assert!(matches!(Physical::from_std_file(&handle), Err(FileError(_))));
    }

    #[test]
    fn physical_empty_file() {
        let file = temp_file(b"");

        let physical = Physical::new(file.path()).unwrap();
        assert_eq!(physical.len(), 0);
        assert!(physical.data_slice(0, 1).is_err());
        let empty_slice: &[u8] = &[];
        assert_eq!(physical.data_slice(0, 0).unwrap(), empty_slice);
    }
}
