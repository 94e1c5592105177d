//! Debug directory reader.
//!
//! The Debug data directory is an array of 28-byte `IMAGE_DEBUG_DIRECTORY` entries. Each one
//! points at its payload twice: by RVA when the payload is loaded and by raw file offset.
//! CodeView payloads carry the PDB path that symbol servers key on, either in the `RSDS`
//! (PDB 7.0, GUID + age) or `NB10` (PDB 2.0, timestamp + age) form.

use uguid::Guid;

use crate::{
    file::io::read_le,
    pe::{
        constants::{
            CV_SIGNATURE_NB10, CV_SIGNATURE_RSDS, DEBUG_DIRECTORY_SIZE, IMAGE_DEBUG_TYPE_CODEVIEW,
            MAX_NAME_LEN,
        },
        DataDirectoryType, MapMode, MemoryMap, PeFile,
    },
};

/// Decoded CodeView record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeView {
    /// `RSDS` record
    Pdb70 {
        /// PDB signature GUID
        guid: Guid,
        /// Incremented on every PDB write
        age: u32,
        /// Path of the PDB file
        path: String,
    },
    /// `NB10` record
    Pdb20 {
        /// Timestamp signature
        signature: u32,
        /// Incremented on every PDB write
        age: u32,
        /// Path of the PDB file
        path: String,
    },
}

impl CodeView {
    /// Path of the PDB file.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            CodeView::Pdb70 { path, .. } | CodeView::Pdb20 { path, .. } => path,
        }
    }

    /// Symbol server key: signature followed by the age in hex.
    #[must_use]
    pub fn symbol_key(&self) -> String {
        match self {
            CodeView::Pdb70 { guid, age, .. } => {
                format!("{}{age:x}", guid.to_string().replace('-', "").to_uppercase())
            }
            CodeView::Pdb20 { signature, age, .. } => format!("{signature:08X}{age:x}"),
        }
    }
}

/// One `IMAGE_DEBUG_DIRECTORY` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugDirectory {
    /// Reserved, 0
    pub characteristics: u32,
    /// Creation timestamp
    pub time_date_stamp: u32,
    /// Format major version
    pub major_version: u16,
    /// Format minor version
    pub minor_version: u16,
    /// `IMAGE_DEBUG_TYPE_*`
    pub debug_type: u32,
    /// Payload size
    pub size_of_data: u32,
    /// Payload RVA, 0 when not loaded
    pub address_of_raw_data: u32,
    /// Payload file offset
    pub pointer_to_raw_data: u32,
    /// CodeView record for `IMAGE_DEBUG_TYPE_CODEVIEW` entries
    pub codeview: Option<CodeView>,
}

impl PeFile {
    /// Reads the debug directory array.
    ///
    /// At most [`crate::ParseLimits::max_debug_entries`] entries are read.
    #[must_use]
    pub fn debug_directories(&self) -> Vec<DebugDirectory> {
        let Some(directory) = self.data_directory(DataDirectoryType::Debug) else {
            return Vec::new();
        };
        let map = self.map();
        let count = (u64::from(directory.size) / DEBUG_DIRECTORY_SIZE)
            .min(self.options().limits.max_debug_entries as u64);

        let mut entries = Vec::new();
        for index in 0..count {
            if self.is_cancelled() {
                break;
            }

            let rva = u64::from(directory.virtual_address) + index * DEBUG_DIRECTORY_SIZE;
            let Some(offset) = map.rel_address_to_offset(rva) else {
                break;
            };
            let Ok(raw) = self.file().read_array(offset, DEBUG_DIRECTORY_SIZE as usize) else {
                break;
            };
            let u32_at = |at: usize| read_le::<u32>(&raw[at..]).unwrap_or(0);
            let u16_at = |at: usize| read_le::<u16>(&raw[at..]).unwrap_or(0);

            let mut entry = DebugDirectory {
                characteristics: u32_at(0),
                time_date_stamp: u32_at(4),
                major_version: u16_at(8),
                minor_version: u16_at(10),
                debug_type: u32_at(12),
                size_of_data: u32_at(16),
                address_of_raw_data: u32_at(20),
                pointer_to_raw_data: u32_at(24),
                codeview: None,
            };
            if entry.debug_type == IMAGE_DEBUG_TYPE_CODEVIEW {
                entry.codeview = self.codeview(&map, &entry);
            }
            entries.push(entry);
        }

        entries
    }

    /// The first CodeView record, if any.
    #[must_use]
    pub fn pdb_info(&self) -> Option<CodeView> {
        self.debug_directories()
            .into_iter()
            .find_map(|entry| entry.codeview)
    }

    fn codeview(&self, map: &MemoryMap, entry: &DebugDirectory) -> Option<CodeView> {
        let offset = match map.mode {
            MapMode::File if entry.pointer_to_raw_data != 0 => u64::from(entry.pointer_to_raw_data),
            _ => map.rel_address_to_offset(u64::from(entry.address_of_raw_data))?,
        };
        let file = self.file();
        let path_limit = (entry.size_of_data as usize).min(MAX_NAME_LEN);

        match file.read_u32(offset, false).ok()? {
            CV_SIGNATURE_RSDS => {
                let bytes: [u8; 16] = file.read_array(offset + 4, 16).ok()?.try_into().ok()?;
                Some(CodeView::Pdb70 {
                    guid: Guid::from_bytes(bytes),
                    age: file.read_u32(offset + 20, false).ok()?,
                    path: file.read_ansi_string(offset + 24, path_limit).ok()?,
                })
            }
            CV_SIGNATURE_NB10 => Some(CodeView::Pdb20 {
                signature: file.read_u32(offset + 8, false).ok()?,
                age: file.read_u32(offset + 12, false).ok()?,
                path: file.read_ansi_string(offset + 16, path_limit).ok()?,
            }),
            other => {
                log::debug!("unknown CodeView signature 0x{other:08x}");
                None
            }
        }
    }
}
