//! Windows Portable Executable (PE32 / PE32+) parsing and restructuring.
//!
//! [`PeFile`] is the entry point. It wraps a [`crate::file::File`] byte accessor, parses the
//! headers once, and exposes every data directory through a walker method. Walkers build a
//! fresh [`MemoryMap`] per call to translate RVAs and never cache across mutations.
//!
//! # Architecture
//!
//! - [`headers`] - DOS, COFF, optional and section headers
//! - [`layout`] - Per-bitness field tables driving the optional header, TLS and load config readers
//! - [`memmap`] - Region list and RVA / VA / file offset translation
//! - [`imports`], [`delayimports`], [`boundimports`] - Import resolvers
//! - [`exports`] - Export resolver
//! - [`resources`], [`version`] - Resource tree walkers and `VS_VERSIONINFO` decoding
//! - [`relocations`] - Base relocation codec
//! - [`tls`], [`loadconfig`], [`debug`] - Flat directory readers
//! - [`write`] - Section mutation engine and checksum
//!
//! # Error model
//!
//! A file that fails the structural checks (`MZ`, `e_lfanew`, `PE\0\0`, a complete optional
//! header) still opens: [`PeFile::is_valid`] returns `false` and every walker returns an empty
//! result. Corruption inside a valid image is repaired locally and logged; only I/O and the
//! mutation engine return errors.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::PeFile;
//! use std::path::Path;
//!
//! let pe = PeFile::from_file(Path::new("sample.exe"))?;
//! for import in pe.imports() {
//!     println!("{}: {} symbols", import.library_name, import.positions.len());
//! }
//! if let Some(exports) = pe.exports(true) {
//!     println!("{} exports", exports.positions.len());
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

pub mod boundimports;
pub mod constants;
pub mod debug;
pub mod delayimports;
pub mod exports;
pub mod headers;
pub mod imports;
pub mod layout;
pub mod loadconfig;
pub mod memmap;
pub mod relocations;
pub mod resources;
pub mod tls;
pub mod version;
pub mod write;

pub use headers::{
    DataDirectory, DataDirectoryType, DosHeader, FileHeader, OptionalHeader, PeHeaders,
    SectionFlags, SectionHeader,
};
pub use memmap::{Bitness, Endianness, MapMode, MemoryMap, Region, RegionKind};

use std::path::Path;

use crate::{
    config::ParserOptions,
    file::{Backend, File},
    utils::CancellationToken,
    Result,
};

/// A parsed PE image over a byte accessor.
///
/// Opening never fails on malformed content; check [`PeFile::is_valid`]. Mutations require
/// `&mut self` and re-parse the headers once applied.
pub struct PeFile {
    file: File,
    options: ParserOptions,
    headers: Option<PeHeaders>,
    cancel: CancellationToken,
}

impl PeFile {
    /// Memory-maps and parses the file at `path` with default options.
    ///
    /// The mapping is read-only; use [`PeFile::from_mem`] for images that will be mutated.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Empty`] if it is empty.
    pub fn from_file(path: &Path) -> Result<PeFile> {
        Self::from_file_with_options(path, ParserOptions::default())
    }

    /// Memory-maps and parses the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Empty`] if it is empty.
    pub fn from_file_with_options(path: &Path, options: ParserOptions) -> Result<PeFile> {
        Ok(Self::from_accessor(File::from_file(path)?, options))
    }

    /// Parses an owned buffer with default options.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<PeFile> {
        Self::from_mem_with_options(data, ParserOptions::default())
    }

    /// Parses an owned buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem_with_options(data: Vec<u8>, options: ParserOptions) -> Result<PeFile> {
        Ok(Self::from_accessor(File::from_mem(data)?, options))
    }

    /// Parses bytes provided by a custom backend.
    #[must_use]
    pub fn from_backend(backend: Box<dyn Backend>, options: ParserOptions) -> PeFile {
        Self::from_accessor(File::from_backend(backend), options)
    }

    fn from_accessor(file: File, options: ParserOptions) -> PeFile {
        let headers = PeHeaders::parse(&file, &options.limits);
        if headers.is_none() {
            log::debug!("input of {} bytes is not a valid PE image", file.len());
        }

        PeFile {
            file,
            options,
            headers,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns `true` if the structural header checks passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.headers.is_some()
    }

    /// Parsed headers of a valid image.
    #[must_use]
    pub fn headers(&self) -> Option<&PeHeaders> {
        self.headers.as_ref()
    }

    /// Section headers; empty for invalid images.
    #[must_use]
    pub fn sections(&self) -> &[SectionHeader] {
        self.headers
            .as_ref()
            .map_or(&[], |headers| headers.sections.as_slice())
    }

    /// Returns a data directory if it is present (non-zero address and size).
    #[must_use]
    pub fn data_directory(&self, kind: DataDirectoryType) -> Option<DataDirectory> {
        let directory = self.headers.as_ref()?.directory(kind);
        (!directory.is_empty()).then_some(directory)
    }

    /// Returns `true` for PE32+ images.
    #[must_use]
    pub fn is_64(&self) -> bool {
        self.headers.as_ref().is_some_and(|h| h.optional.is_64)
    }

    /// `ImageBase` from the optional header.
    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.headers.as_ref().map_or(0, |h| h.optional.image_base)
    }

    /// Base address used for VA computations: the configured module base or `ImageBase`.
    #[must_use]
    pub fn module_base(&self) -> u64 {
        self.options.module_base.unwrap_or_else(|| self.image_base())
    }

    /// Builds the memory map in the given coordinate space.
    ///
    /// Invalid images yield a map without regions, on which every translation fails.
    #[must_use]
    pub fn memory_map(&self, mode: MapMode) -> MemoryMap {
        let binary_size = self.file.len() as u64;
        match &self.headers {
            Some(headers) => MemoryMap::build(binary_size, headers, mode, self.options.module_base),
            None => MemoryMap {
                binary_size,
                image_size: 0,
                bitness: Bitness::Bits32,
                endianness: Endianness::Little,
                entry_point_address: 0,
                module_base_address: self.options.module_base.unwrap_or(0),
                mode,
                file_alignment: constants::DEFAULT_FILE_ALIGNMENT,
                section_alignment: constants::DEFAULT_SECTION_ALIGNMENT,
                regions: Vec::new(),
            },
        }
    }

    /// Builds the memory map in the coordinate space the image was opened with.
    #[must_use]
    pub fn map(&self) -> MemoryMap {
        self.memory_map(self.options.mode)
    }

    /// Translates an RVA into an offset in the backing store.
    #[must_use]
    pub fn rva_to_offset(&self, rva: u32) -> Option<u64> {
        self.map().rel_address_to_offset(u64::from(rva))
    }

    /// The byte accessor.
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The complete backing store.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.file.data()
    }

    /// Options the image was opened with.
    #[must_use]
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Returns a handle on the token polled by the walkers.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replaces the token polled by the walkers, e.g. with one wired to Ctrl+C.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reads a NUL-terminated ANSI string at an RVA, `None` if the RVA does not translate.
    pub(crate) fn read_ansi_at(&self, map: &MemoryMap, rva: u64, max_len: usize) -> Option<String> {
        let offset = map.rel_address_to_offset(rva)?;
        self.file.read_ansi_string(offset, max_len).ok()
    }

    /// Re-parses the headers after the backing store changed.
    pub(crate) fn refresh(&mut self) {
        self.headers = PeHeaders::parse(&self.file, &self.options.limits);
    }

    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Writes the current bytes to `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.file.data())?;
        Ok(())
    }
}

impl std::fmt::Debug for PeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeFile")
            .field("len", &self.file.len())
            .field("valid", &self.is_valid())
            .field("is_64", &self.is_64())
            .field("sections", &self.sections().len())
            .finish()
    }
}
