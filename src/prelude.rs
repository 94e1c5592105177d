//! Convenient re-exports of the most commonly used types.
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let pe = PeFile::from_file("sample.exe".as_ref())?;
//! let map: MemoryMap = pe.memory_map(MapMode::Image);
//! println!("{} regions", map.regions.len());
//! # Ok::<(), pescope::Error>(())
//! ```

pub use crate::{
    config::{ParseLimits, ParserOptions},
    file::{parser::Parser, File},
    format::{BinaryFormat, FormatInfo, FormatKind},
    metadata::{tables::TableId, CliMetadata},
    pe::{
        debug::{CodeView, DebugDirectory},
        exports::{ExportHeader, ExportPosition},
        imports::{ImportHeader, ImportPosition},
        relocations::RelocationBlock,
        resources::{ResourceName, ResourceRecord},
        write::RewritePlan,
        Bitness, DataDirectory, DataDirectoryType, MapMode, MemoryMap, PeFile, Region, RegionKind,
        SectionFlags, SectionHeader,
    },
    security::{SignatureInfo, WinCertificate},
    utils::CancellationToken,
    Error, Result,
};
