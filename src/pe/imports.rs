//! Import directory resolver.
//!
//! Walks the zero-terminated `IMAGE_IMPORT_DESCRIPTOR` array referenced by the Import data
//! directory. For every descriptor the library name is read as an ANSI string and its thunk
//! chain is decoded: `OriginalFirstThunk` when present, `FirstThunk` otherwise.
//!
//! ```text
//! IMAGE_IMPORT_DESCRIPTOR (20 bytes)
//! +0   OriginalFirstThunk   RVA of the lookup table
//! +4   TimeDateStamp
//! +8   ForwarderChain
//! +12  Name                 RVA of the library name
//! +16  FirstThunk           RVA of the address table
//! ```
//!
//! A thunk with the top bit set imports by ordinal (the low 31 or 63 bits); any other non-zero
//! thunk is the RVA of a hint/name entry. A thunk that cannot be resolved ends its own chain
//! only, the remaining descriptors are still decoded.
//!
//! Some packers leave garbage in the upper half of `FirstThunk`. When the two bytes preceding
//! the second descriptor do not translate, [`first_thunk_needs_masking`] reports it and every
//! `FirstThunk` is reduced to its low 16 bits.

use crate::{
    file::io::read_le,
    pe::{
        constants::{IMPORT_DESCRIPTOR_SIZE, MAX_NAME_LEN, ORDINAL_FLAG32, ORDINAL_FLAG64},
        DataDirectoryType, MemoryMap, PeFile,
    },
};

/// One imported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPosition {
    /// RVA of the address table slot the loader patches
    pub thunk_rva: u64,
    /// Raw lookup thunk value
    pub thunk_value: u64,
    /// Ordinal for imports by ordinal
    pub ordinal: Option<u64>,
    /// Symbol name, empty for imports by ordinal
    pub name: String,
    /// Export name table hint
    pub hint: u16,
}

impl ImportPosition {
    /// Returns `true` if the symbol is imported by ordinal.
    #[must_use]
    pub fn is_ordinal(&self) -> bool {
        self.ordinal.is_some()
    }
}

/// One imported library with its decoded thunk chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportHeader {
    /// Library name as stored in the image
    pub library_name: String,
    /// RVA of the import lookup table
    pub original_first_thunk: u32,
    /// Bound timestamp, `0xFFFFFFFF` when bound imports apply
    pub time_date_stamp: u32,
    /// Index of the first forwarder reference
    pub forwarder_chain: u32,
    /// RVA of the library name
    pub name_rva: u32,
    /// RVA of the import address table, masked when the packer heuristic applies
    pub first_thunk: u32,
    /// Decoded symbols in thunk order
    pub positions: Vec<ImportPosition>,
}

impl ImportHeader {
    /// Names of the symbols imported by name.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.positions
            .iter()
            .filter(|position| position.ordinal.is_none())
            .map(|position| position.name.as_str())
    }

    /// Looks up a symbol imported by name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<&ImportPosition> {
        self.positions
            .iter()
            .find(|position| position.ordinal.is_none() && position.name == name)
    }
}

/// Returns `true` when `FirstThunk` values have to be reduced to their low 16 bits.
///
/// The probe is the RVA two bytes before the second descriptor. Images whose import
/// directory is cut short there were produced by packers that also corrupt the upper half of
/// `FirstThunk`.
#[must_use]
pub fn first_thunk_needs_masking(map: &MemoryMap, import_directory_rva: u32) -> bool {
    let probe = u64::from(import_directory_rva) + IMPORT_DESCRIPTOR_SIZE - 2;
    map.rel_address_to_offset(probe).is_none()
}

impl PeFile {
    /// Decodes the import directory.
    ///
    /// Returns an empty list for invalid images or when no import directory is present.
    #[must_use]
    pub fn imports(&self) -> Vec<ImportHeader> {
        let Some(directory) = self.data_directory(DataDirectoryType::Import) else {
            return Vec::new();
        };

        let map = self.map();
        let is_64 = self.is_64();
        // decided once for the directory, then applied to every descriptor
        let masked = first_thunk_needs_masking(&map, directory.virtual_address);
        if masked {
            log::debug!("import directory is truncated, masking FirstThunk to 16 bits");
        }

        let mut headers = Vec::new();
        let mut descriptor_rva = u64::from(directory.virtual_address);
        loop {
            if self.is_cancelled() {
                break;
            }

            let Some(offset) = map.rel_address_to_offset(descriptor_rva) else {
                log::debug!("import descriptor at rva 0x{descriptor_rva:x} does not translate");
                break;
            };
            let Ok(raw) = self.file().read_array(offset, IMPORT_DESCRIPTOR_SIZE as usize) else {
                break;
            };

            let field = |at: usize| read_le::<u32>(&raw[at..]).unwrap_or(0);
            let original_first_thunk = field(0);
            let time_date_stamp = field(4);
            let forwarder_chain = field(8);
            let name_rva = field(12);
            let mut first_thunk = field(16);
            if masked {
                first_thunk &= 0xFFFF;
            }

            if name_rva == 0 && first_thunk == 0 {
                break;
            }

            let library_name = self
                .read_ansi_at(&map, u64::from(name_rva), MAX_NAME_LEN)
                .unwrap_or_default();
            if library_name.is_empty() {
                log::debug!("import descriptor at rva 0x{descriptor_rva:x} has no name, stopping");
                break;
            }

            let lookup = if original_first_thunk != 0 {
                original_first_thunk
            } else {
                first_thunk
            };
            let positions = self.thunk_chain(&map, lookup, first_thunk, is_64, 0);

            headers.push(ImportHeader {
                library_name,
                original_first_thunk,
                time_date_stamp,
                forwarder_chain,
                name_rva,
                first_thunk,
                positions,
            });

            descriptor_rva += IMPORT_DESCRIPTOR_SIZE;
        }

        headers
    }

    /// Finds an imported library by name, ignoring ASCII case.
    #[must_use]
    pub fn import_by_library(&self, library: &str) -> Option<ImportHeader> {
        self.imports()
            .into_iter()
            .find(|header| header.library_name.eq_ignore_ascii_case(library))
    }

    /// RVA of the address table slot for `library!function`.
    #[must_use]
    pub fn import_slot(&self, library: &str, function: &str) -> Option<u64> {
        self.import_by_library(library)?
            .position(function)
            .map(|position| position.thunk_rva)
    }

    /// Decodes a zero-terminated thunk chain.
    ///
    /// `lookup_rva` is read, `address_rva` only provides the slot RVA reported per position.
    /// Hint/name references are virtual addresses relative to `name_base`, which is 0 for
    /// RVA-based tables.
    pub(crate) fn thunk_chain(
        &self,
        map: &MemoryMap,
        lookup_rva: u32,
        address_rva: u32,
        is_64: bool,
        name_base: u64,
    ) -> Vec<ImportPosition> {
        let thunk_size: u64 = if is_64 { 8 } else { 4 };
        let ordinal_flag = if is_64 { ORDINAL_FLAG64 } else { ORDINAL_FLAG32 };

        let mut positions = Vec::new();
        for index in 0u64.. {
            if self.is_cancelled() {
                break;
            }

            let slot_rva = u64::from(lookup_rva) + index * thunk_size;
            let Some(offset) = map.rel_address_to_offset(slot_rva) else {
                log::debug!("thunk at rva 0x{slot_rva:x} does not translate");
                break;
            };
            let Ok(value) = self.file().read_native(offset, is_64) else {
                break;
            };
            if value == 0 {
                break;
            }

            let thunk_rva = u64::from(address_rva) + index * thunk_size;
            if value & ordinal_flag != 0 {
                positions.push(ImportPosition {
                    thunk_rva,
                    thunk_value: value,
                    ordinal: Some(value & !ordinal_flag),
                    name: String::new(),
                    hint: 0,
                });
                continue;
            }

            let hint_rva = value.wrapping_sub(name_base) & 0x7FFF_FFFF;
            let Some(hint_offset) = map.rel_address_to_offset(hint_rva) else {
                log::debug!("hint/name entry at rva 0x{hint_rva:x} does not translate");
                break;
            };
            let Ok(hint) = self.file().read_u16(hint_offset, false) else {
                break;
            };
            let name = self
                .read_ansi_at(map, hint_rva + 2, MAX_NAME_LEN)
                .unwrap_or_default();

            positions.push(ImportPosition {
                thunk_rva,
                thunk_value: value,
                ordinal: None,
                name,
                hint,
            });
        }

        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{build_imports, dir, open, ImportSpec, TestImage};

    fn image(is_64: bool, libraries: &[(&str, &[ImportSpec])]) -> TestImage {
        let built = build_imports(0x2000, is_64, libraries);
        TestImage::new(is_64)
            .section(".text", 0x1000, vec![0xC3; 0x10])
            .section(".idata", 0x2000, built.data)
            .directory(dir::IMPORT, 0x2000, built.directory_size)
    }

    #[test]
    fn pe32plus_exit_process() {
        let pe = open(&image(
            true,
            &[("KERNEL32.DLL", &[ImportSpec::Name("ExitProcess", 0x120)])],
        ));

        let imports = pe.imports();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].library_name, "KERNEL32.DLL");
        assert_eq!(imports[0].positions.len(), 1);

        let position = &imports[0].positions[0];
        assert_eq!(position.name, "ExitProcess");
        assert_eq!(position.hint, 0x120);
        assert_eq!(position.ordinal, None);
        assert_eq!(
            pe.import_slot("kernel32.dll", "ExitProcess"),
            Some(u64::from(imports[0].first_thunk))
        );
    }

    #[test]
    fn names_and_ordinals_are_partitioned() {
        let specs = [
            ImportSpec::Name("CreateFileW", 1),
            ImportSpec::Ordinal(17),
            ImportSpec::Name("ReadFile", 2),
            ImportSpec::Ordinal(0x200),
            ImportSpec::Name("CloseHandle", 3),
        ];
        for is_64 in [false, true] {
            let pe = open(&image(is_64, &[("KERNEL32.dll", &specs), ("WS2_32.dll", &specs[1..2])]));
            let imports = pe.imports();

            assert_eq!(imports.len(), 2);
            assert_eq!(imports[0].positions.len(), 5);
            let ordinals: Vec<_> = imports[0]
                .positions
                .iter()
                .filter_map(|p| p.ordinal)
                .collect();
            assert_eq!(ordinals, vec![17, 0x200]);
            assert_eq!(
                imports[0].function_names().collect::<Vec<_>>(),
                vec!["CreateFileW", "ReadFile", "CloseHandle"]
            );
            assert_eq!(imports[1].positions.len(), 1);
            assert!(imports[1].positions[0].is_ordinal());
        }
    }

    #[test]
    fn thunk_slots_follow_first_thunk() {
        let pe = open(&image(
            false,
            &[("USER32.dll", &[ImportSpec::Name("MessageBoxA", 0), ImportSpec::Ordinal(5)])],
        ));
        let header = &pe.imports()[0];

        assert_ne!(header.original_first_thunk, header.first_thunk);
        assert_eq!(header.positions[0].thunk_rva, u64::from(header.first_thunk));
        assert_eq!(header.positions[1].thunk_rva, u64::from(header.first_thunk) + 4);
    }

    #[test]
    fn first_thunk_used_without_lookup_table() {
        let mut built = build_imports(0x2000, false, &[("A.dll", &[ImportSpec::Name("f", 0)])]);
        built.data[0..4].copy_from_slice(&0u32.to_le_bytes());

        let pe = open(
            &TestImage::new(false)
                .section(".idata", 0x2000, built.data)
                .directory(dir::IMPORT, 0x2000, built.directory_size),
        );
        let imports = pe.imports();

        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].original_first_thunk, 0);
        assert_eq!(imports[0].positions[0].name, "f");
    }

    #[test]
    fn unresolved_chain_keeps_other_libraries() {
        let mut built = build_imports(
            0x2000,
            false,
            &[("A.dll", &[ImportSpec::Name("a", 0)]), ("B.dll", &[ImportSpec::Name("b", 0)])],
        );
        // lookup table of the first library points nowhere
        built.data[0..4].copy_from_slice(&0x00F0_0000u32.to_le_bytes());

        let pe = open(
            &TestImage::new(false)
                .section(".idata", 0x2000, built.data)
                .directory(dir::IMPORT, 0x2000, built.directory_size),
        );
        let imports = pe.imports();

        assert_eq!(imports.len(), 2);
        assert!(imports[0].positions.is_empty());
        assert_eq!(imports[1].positions[0].name, "b");
    }

    #[test]
    fn masking_detects_truncated_directory() {
        let pe = open(&image(false, &[("A.dll", &[ImportSpec::Name("a", 0)])]));
        let map = pe.map();

        assert!(!first_thunk_needs_masking(&map, 0x2000));
        assert!(first_thunk_needs_masking(&map, 0x0080_0000));
    }

    #[test]
    fn cancelled_walk_returns_partial() {
        let pe = open(&image(false, &[("A.dll", &[ImportSpec::Name("a", 0)])]));
        pe.cancellation_token().cancel();

        assert!(pe.imports().is_empty());
    }
}
