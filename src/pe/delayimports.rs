//! Delay-load import directory resolver.
//!
//! The DelayImport data directory points at an array of 32-byte `ImgDelayDescr` records,
//! terminated by an all-zero record. Bit 0 of `Attributes` selects the address encoding: when
//! set every table reference is an RVA, otherwise it is a virtual address based on
//! `ImageBase` (the Visual C++ 6 layout).

use crate::{
    file::io::read_le,
    pe::{
        constants::{DELAY_DESCRIPTOR_SIZE, MAX_NAME_LEN},
        imports::ImportPosition,
        DataDirectoryType, PeFile,
    },
};

/// One delay-loaded library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayImportDescriptor {
    /// Raw `Attributes`, bit 0 set for RVA-based tables
    pub attributes: u32,
    /// Library name reference
    pub dll_name_rva: u32,
    /// Module handle slot reference
    pub module_handle_rva: u32,
    /// Address table reference
    pub import_address_table_rva: u32,
    /// Name table reference
    pub import_name_table_rva: u32,
    /// Bound address table reference
    pub bound_import_address_table_rva: u32,
    /// Unload information table reference
    pub unload_information_table_rva: u32,
    /// Bound timestamp
    pub time_date_stamp: u32,
    /// Library name
    pub library_name: String,
    /// Decoded symbols, with `thunk_rva` normalized to an RVA
    pub positions: Vec<ImportPosition>,
}

impl DelayImportDescriptor {
    /// Returns `true` when the table references are RVAs.
    #[must_use]
    pub fn is_rva_based(&self) -> bool {
        self.attributes & 1 != 0
    }
}

impl PeFile {
    /// Decodes the delay-load import directory.
    #[must_use]
    pub fn delay_imports(&self) -> Vec<DelayImportDescriptor> {
        let Some(directory) = self.data_directory(DataDirectoryType::DelayImport) else {
            return Vec::new();
        };

        let map = self.map();
        let is_64 = self.is_64();
        let image_base = self.image_base();

        let mut descriptors = Vec::new();
        let mut descriptor_rva = u64::from(directory.virtual_address);
        loop {
            if self.is_cancelled() {
                break;
            }

            let Some(offset) = map.rel_address_to_offset(descriptor_rva) else {
                break;
            };
            let Ok(raw) = self.file().read_array(offset, DELAY_DESCRIPTOR_SIZE as usize) else {
                break;
            };
            if raw.iter().all(|byte| *byte == 0) {
                break;
            }

            let field = |at: usize| read_le::<u32>(&raw[at..]).unwrap_or(0);
            let attributes = field(0);
            let base = if attributes & 1 != 0 { 0 } else { image_base };
            let to_rva = |value: u32| -> u32 {
                if value == 0 {
                    0
                } else {
                    (u64::from(value).wrapping_sub(base) & 0xFFFF_FFFF) as u32
                }
            };

            let dll_name_rva = field(4);
            let library_name = self
                .read_ansi_at(&map, u64::from(to_rva(dll_name_rva)), MAX_NAME_LEN)
                .unwrap_or_default();
            if library_name.is_empty() {
                log::debug!("delay descriptor at rva 0x{descriptor_rva:x} has no name, stopping");
                break;
            }

            let import_address_table_rva = field(12);
            let import_name_table_rva = field(16);
            let positions = self.thunk_chain(
                &map,
                to_rva(import_name_table_rva),
                to_rva(import_address_table_rva),
                is_64,
                base,
            );

            descriptors.push(DelayImportDescriptor {
                attributes,
                dll_name_rva,
                module_handle_rva: field(8),
                import_address_table_rva,
                import_name_table_rva,
                bound_import_address_table_rva: field(20),
                unload_information_table_rva: field(24),
                time_date_stamp: field(28),
                library_name,
                positions,
            });

            descriptor_rva += DELAY_DESCRIPTOR_SIZE;
        }

        descriptors
    }
}

#[cfg(test)]
mod tests {
    use crate::test::{dir, open, TestImage, DEFAULT_IMAGE_BASE_32};

    // descriptors at +0, name at +0x40, hint/name at +0x50, INT at +0x60, IAT at +0x70
    fn payload(base_rva: u32, va_base: u32, attributes: u32) -> Vec<u8> {
        let mut data = vec![0u8; 0x80];
        let reference = |offset: u32| (va_base + base_rva + offset).to_le_bytes();

        data[0..4].copy_from_slice(&attributes.to_le_bytes());
        data[4..8].copy_from_slice(&reference(0x40));
        data[12..16].copy_from_slice(&reference(0x70));
        data[16..20].copy_from_slice(&reference(0x60));

        data[0x40..0x4A].copy_from_slice(b"DELAY.dll\0");
        data[0x52..0x56].copy_from_slice(b"Foo\0");
        data[0x60..0x64].copy_from_slice(&reference(0x50));
        data[0x64..0x68].copy_from_slice(&0x8000_0007u32.to_le_bytes());
        data
    }

    #[test]
    fn rva_based_descriptor() {
        let pe = open(
            &TestImage::new(false)
                .section(".didat", 0x3000, payload(0x3000, 0, 1))
                .directory(dir::DELAY_IMPORT, 0x3000, 0x40),
        );
        let delay = pe.delay_imports();

        assert_eq!(delay.len(), 1);
        assert!(delay[0].is_rva_based());
        assert_eq!(delay[0].library_name, "DELAY.dll");
        assert_eq!(delay[0].positions.len(), 2);
        assert_eq!(delay[0].positions[0].name, "Foo");
        assert_eq!(delay[0].positions[0].thunk_rva, 0x3070);
        assert_eq!(delay[0].positions[1].ordinal, Some(7));
    }

    #[test]
    fn va_based_descriptor() {
        let pe = open(
            &TestImage::new(false)
                .section(".didat", 0x3000, payload(0x3000, DEFAULT_IMAGE_BASE_32 as u32, 0))
                .directory(dir::DELAY_IMPORT, 0x3000, 0x40),
        );
        let delay = pe.delay_imports();

        assert_eq!(delay.len(), 1);
        assert!(!delay[0].is_rva_based());
        assert_eq!(delay[0].positions[0].name, "Foo");
        assert_eq!(delay[0].positions[0].thunk_rva, 0x3070);
    }
}
