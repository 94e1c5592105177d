//! Export directory resolver.
//!
//! The export directory holds three parallel tables: the address table (one RVA per
//! ordinal slot), the name pointer table and the name ordinal table mapping each name to an
//! address table index. [`PeFile::exports`] yields one [`ExportPosition`] per address table
//! slot, attaching the first name that maps to it and keeping any further names as aliases.
//!
//! An address pointing back inside the export directory is a forwarder: the bytes at that RVA
//! are an ANSI `LIBRARY.Symbol` string rather than code.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::PeFile;
//! use std::path::Path;
//!
//! let pe = PeFile::from_file(Path::new("library.dll"))?;
//! if let Some(exports) = pe.exports(true) {
//!     for export in &exports.positions {
//!         match &export.forwarder {
//!             Some(target) => println!("#{} {} -> {target}", export.ordinal, export.name),
//!             None => println!("#{} {} @ 0x{:x}", export.ordinal, export.name, export.rva),
//!         }
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    file::io::read_le,
    pe::{
        constants::{EXPORT_DIRECTORY_SIZE, MAX_NAME_LEN},
        DataDirectoryType, PeFile,
    },
};

/// One exported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPosition {
    /// Biased ordinal, `Base + index`
    pub ordinal: u32,
    /// Address table entry
    pub rva: u32,
    /// RVA of the name, 0 for exports by ordinal only
    pub name_rva: u32,
    /// Symbol name, empty when none maps to the slot or it cannot be read
    pub name: String,
    /// Further names mapping to the same slot, in name table order
    pub aliases: Vec<String>,
    /// Forwarder string when the address points into the export directory
    pub forwarder: Option<String>,
}

/// The export directory with its decoded symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportHeader {
    /// Reserved, 0
    pub characteristics: u32,
    /// Creation timestamp
    pub time_date_stamp: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// RVA of the DLL name
    pub name_rva: u32,
    /// Ordinal bias
    pub base: u32,
    /// Address table entry count
    pub number_of_functions: u32,
    /// Name table entry count
    pub number_of_names: u32,
    /// RVA of the address table
    pub address_of_functions: u32,
    /// RVA of the name pointer table
    pub address_of_names: u32,
    /// RVA of the name ordinal table
    pub address_of_name_ordinals: u32,
    /// DLL name
    pub dll_name: String,
    /// One entry per address table slot, minus the ones filtered by `valid_only`
    pub positions: Vec<ExportPosition>,
}

impl ExportHeader {
    /// Looks up an export by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ExportPosition> {
        self.positions.iter().find(|position| {
            position.name == name || position.aliases.iter().any(|alias| alias == name)
        })
    }

    /// Looks up an export by biased ordinal.
    #[must_use]
    pub fn by_ordinal(&self, ordinal: u32) -> Option<&ExportPosition> {
        self.positions
            .iter()
            .find(|position| position.ordinal == ordinal)
    }
}

impl PeFile {
    /// Decodes the export directory.
    ///
    /// With `valid_only`, slots holding 0 or an RVA outside every mapped region are skipped.
    /// Returns `None` when the directory is absent, unreadable, or declares more entries than
    /// [`crate::ParseLimits::max_export_entries`].
    #[must_use]
    pub fn exports(&self, valid_only: bool) -> Option<ExportHeader> {
        let directory = self.data_directory(DataDirectoryType::Export)?;
        let map = self.map();
        let limit = self.options().limits.max_export_entries;

        let offset = map.rel_address_to_offset(u64::from(directory.virtual_address))?;
        let raw = self
            .file()
            .read_array(offset, EXPORT_DIRECTORY_SIZE as usize)
            .ok()?;
        let u32_at = |at: usize| read_le::<u32>(&raw[at..]).unwrap_or(0);
        let u16_at = |at: usize| read_le::<u16>(&raw[at..]).unwrap_or(0);

        let mut header = ExportHeader {
            characteristics: u32_at(0),
            time_date_stamp: u32_at(4),
            major_version: u16_at(8),
            minor_version: u16_at(10),
            name_rva: u32_at(12),
            base: u32_at(16),
            number_of_functions: u32_at(20),
            number_of_names: u32_at(24),
            address_of_functions: u32_at(28),
            address_of_names: u32_at(32),
            address_of_name_ordinals: u32_at(36),
            dll_name: String::new(),
            positions: Vec::new(),
        };

        if header.number_of_functions as usize >= limit || header.number_of_names as usize >= limit {
            log::warn!(
                "export directory declares {} functions and {} names, rejecting",
                header.number_of_functions,
                header.number_of_names
            );
            return None;
        }

        header.dll_name = self
            .read_ansi_at(&map, u64::from(header.name_rva), MAX_NAME_LEN)
            .unwrap_or_default();

        let read_u32_rva = |rva: u64| {
            map.rel_address_to_offset(rva)
                .and_then(|offset| self.file().read_u32(offset, false).ok())
        };
        let read_u16_rva = |rva: u64| {
            map.rel_address_to_offset(rva)
                .and_then(|offset| self.file().read_u16(offset, false).ok())
        };

        let mut names: HashMap<u32, Vec<(u32, String)>> = HashMap::new();
        for index in 0..u64::from(header.number_of_names) {
            if self.is_cancelled() {
                break;
            }

            let Some(slot) = read_u16_rva(u64::from(header.address_of_name_ordinals) + index * 2)
            else {
                break;
            };
            let name_rva = read_u32_rva(u64::from(header.address_of_names) + index * 4).unwrap_or(0);
            let name = self
                .read_ansi_at(&map, u64::from(name_rva), MAX_NAME_LEN)
                .unwrap_or_default();
            names.entry(u32::from(slot)).or_default().push((name_rva, name));
        }

        let directory_start = directory.virtual_address;
        let directory_end = directory.virtual_address.saturating_add(directory.size);
        for index in 0..header.number_of_functions {
            if self.is_cancelled() {
                break;
            }

            let Some(rva) = read_u32_rva(u64::from(header.address_of_functions) + u64::from(index) * 4)
            else {
                log::debug!("export address table ends early at slot {index}");
                break;
            };
            if valid_only && (rva == 0 || !map.contains_rel_address(u64::from(rva))) {
                continue;
            }

            let forwarder = (rva >= directory_start && rva < directory_end)
                .then(|| self.read_ansi_at(&map, u64::from(rva), MAX_NAME_LEN))
                .flatten();
            let mut slot_names = names.remove(&index).unwrap_or_default().into_iter();
            let (name_rva, name) = slot_names.next().unwrap_or_default();
            let aliases = slot_names.map(|(_, alias)| alias).collect();

            header.positions.push(ExportPosition {
                ordinal: header.base.wrapping_add(index),
                rva,
                name_rva,
                name,
                aliases,
                forwarder,
            });
        }

        Some(header)
    }
}
