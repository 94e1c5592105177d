//! Bound import directory resolver.
//!
//! Bound descriptors record the timestamp of every DLL the imports were pre-resolved against.
//! Each 8-byte descriptor is followed by `NumberOfModuleForwarderRefs` forwarder references of
//! the same size; module names are offsets from the start of the directory.

use crate::pe::{
    constants::{BOUND_DESCRIPTOR_SIZE, MAX_NAME_LEN},
    DataDirectoryType, PeFile,
};

/// A forwarder reference of a bound descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundForwarderRef {
    /// Timestamp of the forwarded-to module
    pub time_date_stamp: u32,
    /// Name offset relative to the directory
    pub offset_module_name: u16,
    /// Module name
    pub module_name: String,
}

/// One bound module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundImportDescriptor {
    /// Timestamp the imports were bound against
    pub time_date_stamp: u32,
    /// Name offset relative to the directory
    pub offset_module_name: u16,
    /// Module name
    pub module_name: String,
    /// Forwarder references following the descriptor
    pub forwarders: Vec<BoundForwarderRef>,
}

impl PeFile {
    /// Decodes the bound import directory.
    #[must_use]
    pub fn bound_imports(&self) -> Vec<BoundImportDescriptor> {
        let Some(directory) = self.data_directory(DataDirectoryType::BoundImport) else {
            return Vec::new();
        };

        let map = self.map();
        let start = u64::from(directory.virtual_address);
        let end = start + u64::from(directory.size);
        let name_at = |offset: u16| {
            self.read_ansi_at(&map, start + u64::from(offset), MAX_NAME_LEN)
                .unwrap_or_default()
        };
        let entry_at = |rva: u64| -> Option<(u32, u16, u16)> {
            let offset = map.rel_address_to_offset(rva)?;
            Some((
                self.file().read_u32(offset, false).ok()?,
                self.file().read_u16(offset + 4, false).ok()?,
                self.file().read_u16(offset + 6, false).ok()?,
            ))
        };

        let mut descriptors = Vec::new();
        let mut rva = start;
        while rva + BOUND_DESCRIPTOR_SIZE <= end {
            if self.is_cancelled() {
                break;
            }

            let Some((time_date_stamp, offset_module_name, forwarder_count)) = entry_at(rva) else {
                break;
            };
            if time_date_stamp == 0 && offset_module_name == 0 && forwarder_count == 0 {
                break;
            }
            rva += BOUND_DESCRIPTOR_SIZE;

            let mut forwarders = Vec::with_capacity(usize::from(forwarder_count));
            for _ in 0..forwarder_count {
                let Some((stamp, name_offset, _)) = entry_at(rva) else {
                    break;
                };
                rva += BOUND_DESCRIPTOR_SIZE;
                forwarders.push(BoundForwarderRef {
                    time_date_stamp: stamp,
                    offset_module_name: name_offset,
                    module_name: name_at(name_offset),
                });
            }

            descriptors.push(BoundImportDescriptor {
                time_date_stamp,
                offset_module_name,
                module_name: name_at(offset_module_name),
                forwarders,
            });
        }

        descriptors
    }
}
