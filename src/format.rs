//! Signature sniffing and format dispatch.
//!
//! [`FormatKind::detect`] recognises a handful of container signatures. Only PE images have a
//! parser in this crate; [`open`] looks the detected kind up in a constructor table and returns
//! [`crate::Error::NotSupported`] for everything else.
//!
//! # Examples
//!
//! ```rust
//! use pescope::format::FormatKind;
//!
//! assert_eq!(FormatKind::detect(b"MZ\x90\x00"), FormatKind::Pe);
//! assert_eq!(FormatKind::detect(b"\x7fELF\x02\x01"), FormatKind::Elf);
//! assert_eq!(FormatKind::detect(b"hello"), FormatKind::Unknown);
//! ```

use strum::{Display, EnumIter};

use crate::{
    config::ParserOptions,
    pe::{Bitness, Endianness, MapMode, MemoryMap, PeFile},
    Error::NotSupported,
    Result,
};

/// Container formats recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FormatKind {
    /// `MZ` executables
    #[strum(serialize = "PE")]
    Pe,
    /// `\x7fELF`
    #[strum(serialize = "ELF")]
    Elf,
    /// Mach-O, both byte orders and fat binaries
    #[strum(serialize = "Mach-O")]
    MachO,
    /// `PK\x03\x04`
    #[strum(serialize = "ZIP")]
    Zip,
    /// `%PDF-`
    #[strum(serialize = "PDF")]
    Pdf,
    /// `\x89PNG`
    #[strum(serialize = "PNG")]
    Png,
    /// `\xFF\xD8\xFF`
    #[strum(serialize = "JPEG")]
    Jpeg,
    /// `GIF87a` / `GIF89a`
    #[strum(serialize = "GIF")]
    Gif,
    /// `RIFF`
    #[strum(serialize = "RIFF")]
    Riff,
    /// Nothing matched
    Unknown,
}

const SIGNATURES: &[(&[u8], FormatKind)] = &[
    (b"MZ", FormatKind::Pe),
    (b"\x7fELF", FormatKind::Elf),
    (b"\xFE\xED\xFA\xCE", FormatKind::MachO),
    (b"\xFE\xED\xFA\xCF", FormatKind::MachO),
    (b"\xCE\xFA\xED\xFE", FormatKind::MachO),
    (b"\xCF\xFA\xED\xFE", FormatKind::MachO),
    (b"\xCA\xFE\xBA\xBE", FormatKind::MachO),
    (b"PK\x03\x04", FormatKind::Zip),
    (b"%PDF-", FormatKind::Pdf),
    (b"\x89PNG\r\n\x1a\n", FormatKind::Png),
    (b"\xFF\xD8\xFF", FormatKind::Jpeg),
    (b"GIF87a", FormatKind::Gif),
    (b"GIF89a", FormatKind::Gif),
    (b"RIFF", FormatKind::Riff),
];

impl FormatKind {
    /// Identifies `bytes` by signature.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> FormatKind {
        SIGNATURES
            .iter()
            .find(|(signature, _)| bytes.starts_with(signature))
            .map_or(FormatKind::Unknown, |(_, kind)| *kind)
    }
}

/// Summary every format parser can give.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    /// Detected container
    pub kind: FormatKind,
    /// Target architecture, e.g. `AMD64`
    pub machine: String,
    /// Word size
    pub bitness: Bitness,
    /// Byte order
    pub endianness: Endianness,
    /// Absolute entry point address, `None` without one
    pub entry_point: Option<u64>,
    /// Size of the backing store
    pub size: u64,
}

/// Interface of a format parser.
pub trait BinaryFormat {
    /// Returns `true` if the headers parsed.
    fn is_valid(&self) -> bool;

    /// Region layout in the requested coordinate space.
    fn memory_map(&self, mode: MapMode) -> MemoryMap;

    /// Summary of the parsed headers.
    fn format_info(&self) -> FormatInfo;
}

impl BinaryFormat for PeFile {
    fn is_valid(&self) -> bool {
        PeFile::is_valid(self)
    }

    fn memory_map(&self, mode: MapMode) -> MemoryMap {
        PeFile::memory_map(self, mode)
    }

    fn format_info(&self) -> FormatInfo {
        let map = self.map();
        let (machine, entry_point) = match self.headers() {
            Some(headers) => (
                machine_name(headers.file.machine).to_string(),
                (headers.optional.address_of_entry_point != 0).then_some(map.entry_point_address),
            ),
            None => (machine_name(0).to_string(), None),
        };

        FormatInfo {
            kind: FormatKind::Pe,
            machine,
            bitness: map.bitness,
            endianness: map.endianness,
            entry_point,
            size: map.binary_size,
        }
    }
}

/// `IMAGE_FILE_MACHINE_*` display name.
#[must_use]
pub fn machine_name(machine: u16) -> &'static str {
    match machine {
        0x014C => "I386",
        0x0166 => "R4000",
        0x01C0 => "ARM",
        0x01C4 => "ARMNT",
        0x0200 => "IA64",
        0x5064 => "RISCV64",
        0x8664 => "AMD64",
        0xAA64 => "ARM64",
        0xA641 => "ARM64EC",
        _ => "UNKNOWN",
    }
}

type Constructor = fn(Vec<u8>, ParserOptions) -> Result<Box<dyn BinaryFormat>>;

fn open_pe(data: Vec<u8>, options: ParserOptions) -> Result<Box<dyn BinaryFormat>> {
    Ok(Box::new(PeFile::from_mem_with_options(data, options)?))
}

const CONSTRUCTORS: &[(FormatKind, Constructor)] = &[(FormatKind::Pe, open_pe)];

/// Detects the format of `data` and opens it with the registered parser.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] for formats without a parser and the constructor's
/// error otherwise.
pub fn open(data: Vec<u8>, options: ParserOptions) -> Result<Box<dyn BinaryFormat>> {
    let kind = FormatKind::detect(&data);
    let Some((_, constructor)) = CONSTRUCTORS.iter().find(|(registered, _)| *registered == kind)
    else {
        log::debug!("no parser registered for {kind}");
        return Err(NotSupported);
    };
    constructor(data, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestImage;

    #[test]
    fn detection() {
        assert_eq!(FormatKind::detect(b"%PDF-1.7"), FormatKind::Pdf);
        assert_eq!(FormatKind::detect(b"\xCF\xFA\xED\xFE\x07"), FormatKind::MachO);
        assert_eq!(FormatKind::detect(b"GIF89a\x01"), FormatKind::Gif);
        assert_eq!(FormatKind::detect(b"M"), FormatKind::Unknown);
        assert_eq!(FormatKind::detect(&[]), FormatKind::Unknown);
        assert_eq!(FormatKind::MachO.to_string(), "Mach-O");
    }

    #[test]
    fn dispatch() {
        let image = TestImage::new(true)
            .section(".text", 0x1000, vec![0xC3; 16])
            .entry_point(0x1000);
        let parsed = open(image.build(), ParserOptions::default()).unwrap();

        assert!(parsed.is_valid());
        let info = parsed.format_info();
        assert_eq!(info.kind, FormatKind::Pe);
        assert_eq!(info.machine, "AMD64");
        assert_eq!(info.bitness, Bitness::Bits64);
        assert_eq!(info.entry_point, Some(0x1_4000_1000));
        assert!(!parsed.memory_map(MapMode::File).regions.is_empty());

        assert!(matches!(
            open(b"PK\x03\x04rest".to_vec(), ParserOptions::default()),
            Err(NotSupported)
        ));
    }

    #[test]
    fn dos_stub_is_not_valid() {
        let parsed = open(b"MZ this is not a PE".to_vec(), ParserOptions::default()).unwrap();
        assert!(!parsed.is_valid());
        assert_eq!(parsed.format_info().entry_point, None);
    }
}
