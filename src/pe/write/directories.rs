//! New sections carrying rebuilt data directories.
//!
//! Both operations lay out the directory against the RVA the new section will receive, append
//! the section and re-point the data directory entry in the same plan.

use std::collections::BTreeSet;

use crate::{
    pe::{
        constants::IMPORT_DESCRIPTOR_SIZE,
        relocations::relocs_to_bytes,
        DataDirectoryType, MapMode, PeFile, SectionFlags, SectionHeader,
    },
    utils::to_u32,
    Error, Result,
};

use super::plan::RewritePlan;

/// Import data laid out for a fixed base RVA.
struct ImportBlob {
    data: Vec<u8>,
    descriptors_size: u32,
}

fn layout_error(message: impl Into<String>) -> Error {
    Error::WriteLayoutFailed {
        message: message.into(),
    }
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_thunk(buf: &mut [u8], at: usize, value: u32, is_64: bool) {
    if is_64 {
        buf[at..at + 8].copy_from_slice(&u64::from(value).to_le_bytes());
    } else {
        put_u32(buf, at, value);
    }
}

/// Existing descriptors first, then one per new library, a zero terminator, the lookup and
/// address tables and finally the names.
fn build_import_blob(
    base: u32,
    existing: &[u8],
    libraries: &[(&str, &[&str])],
    is_64: bool,
) -> Result<ImportBlob> {
    let thunk = if is_64 { 8 } else { 4 };
    let descriptor = IMPORT_DESCRIPTOR_SIZE as usize;
    let descriptors_size = existing.len() + (libraries.len() + 1) * descriptor;

    let mut tables = Vec::with_capacity(libraries.len());
    let mut cursor = descriptors_size;
    for (_, functions) in libraries {
        let bytes = (functions.len() + 1) * thunk;
        tables.push((cursor, cursor + bytes));
        cursor += 2 * bytes;
    }

    let mut data = vec![0u8; cursor];
    data[..existing.len()].copy_from_slice(existing);

    let rva = |offset: usize| -> Result<u32> {
        base.checked_add(to_u32(offset as u64)?)
            .ok_or_else(|| layout_error("import data exceeds the address space"))
    };

    for (index, ((library, functions), (lookup, address))) in
        libraries.iter().zip(&tables).enumerate()
    {
        let name_rva = rva(data.len())?;
        data.extend_from_slice(library.as_bytes());
        data.push(0);

        for (slot, function) in functions.iter().enumerate() {
            if data.len() % 2 == 1 {
                data.push(0);
            }
            let hint_name = rva(data.len())?;
            data.extend_from_slice(&0u16.to_le_bytes());
            data.extend_from_slice(function.as_bytes());
            data.push(0);

            put_thunk(&mut data, lookup + slot * thunk, hint_name, is_64);
            put_thunk(&mut data, address + slot * thunk, hint_name, is_64);
        }

        let at = existing.len() + index * descriptor;
        put_u32(&mut data, at, rva(*lookup)?);
        put_u32(&mut data, at + 12, name_rva);
        put_u32(&mut data, at + 16, rva(*address)?);
    }

    Ok(ImportBlob {
        data,
        descriptors_size: to_u32(descriptors_size as u64)?,
    })
}

impl PeFile {
    /// Raw bytes of the current descriptor array, without its terminator.
    fn import_descriptor_bytes(&self) -> Vec<u8> {
        let Some(directory) = self.data_directory(DataDirectoryType::Import) else {
            return Vec::new();
        };
        let map = self.memory_map(MapMode::File);

        let mut bytes = Vec::new();
        for index in 0u64.. {
            if self.is_cancelled() {
                break;
            }
            let rva = u64::from(directory.virtual_address) + index * IMPORT_DESCRIPTOR_SIZE;
            let Some(raw) = map.rel_address_to_offset(rva).and_then(|offset| {
                self.file()
                    .read_array(offset, IMPORT_DESCRIPTOR_SIZE as usize)
                    .ok()
            }) else {
                log::debug!("import descriptor array truncated after {index} entries");
                break;
            };
            if raw.iter().all(|&b| b == 0) {
                break;
            }
            bytes.extend_from_slice(raw);
        }
        bytes
    }

    /// Adds a section with a rebuilt import directory importing `libraries` by name.
    ///
    /// Existing descriptors are copied unchanged so their thunks keep pointing into the old
    /// sections. New address tables are filled with the hint/name RVAs, as a linker emits them.
    ///
    /// # Errors
    /// Returns [`Error::WriteLayoutFailed`] if `libraries` is empty or the section cannot be
    /// added.
    pub fn add_import_section(
        &mut self,
        name: &str,
        libraries: &[(&str, &[&str])],
    ) -> Result<SectionHeader> {
        if libraries.is_empty() {
            return Err(layout_error("no libraries to import"));
        }

        let base = to_u32(self.section_layout()?.next_section_rva())?;
        let existing = self.import_descriptor_bytes();
        let blob = build_import_blob(base, &existing, libraries, self.is_64())?;

        let (mut plan, header) = self.plan_add_section(
            name,
            &blob.data,
            SectionFlags::CNT_INITIALIZED_DATA | SectionFlags::MEM_READ | SectionFlags::MEM_WRITE,
        )?;
        self.patch_directory(&mut plan, DataDirectoryType::Import, base, blob.descriptors_size)?;
        self.apply_plan(&plan)?;

        log::debug!(
            "import directory moved to 0x{base:x} with {} new libraries",
            libraries.len()
        );
        Ok(header)
    }

    /// Adds a section with a relocation directory covering the current relocations and `rvas`.
    ///
    /// # Errors
    /// Returns [`Error::WriteLayoutFailed`] if there is nothing to relocate or the section
    /// cannot be added.
    pub fn add_relocs_section(&mut self, name: &str, rvas: &[u32]) -> Result<SectionHeader> {
        let mut merged: BTreeSet<u32> = self.relocs_as_rva_list();
        merged.extend(rvas.iter().copied());
        if merged.is_empty() {
            return Err(layout_error("no relocations to write"));
        }

        let merged: Vec<u32> = merged.into_iter().collect();
        let data = relocs_to_bytes(&merged, self.is_64());
        let (mut plan, header) = self.plan_add_section(
            name,
            &data,
            SectionFlags::CNT_INITIALIZED_DATA
                | SectionFlags::MEM_READ
                | SectionFlags::MEM_DISCARDABLE,
        )?;
        self.patch_directory(
            &mut plan,
            DataDirectoryType::BaseReloc,
            header.virtual_address,
            to_u32(data.len() as u64)?,
        )?;
        self.apply_plan(&plan)?;

        Ok(header)
    }

    fn patch_directory(
        &self,
        plan: &mut RewritePlan,
        kind: DataDirectoryType,
        virtual_address: u32,
        size: u32,
    ) -> Result<()> {
        let headers = self.headers().ok_or(Error::NotSupported)?;
        if (kind as u32) >= headers.optional.number_of_rva_and_sizes {
            return Err(layout_error(format!(
                "image declares no {kind} directory slot"
            )));
        }

        let at = headers.directory_entry_offset(kind);
        plan.patch_u32(at, virtual_address).patch_u32(at + 4, size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{build_imports, build_relocs, dir, open, ImportSpec, TestImage};

    #[test]
    fn import_section_keeps_existing_descriptors() {
        let imports = build_imports(
            0x2000,
            true,
            &[("KERNEL32.DLL", &[ImportSpec::Name("ExitProcess", 0x15)])],
        );
        let image = TestImage::new(true)
            .section(".text", 0x1000, vec![0xC3; 0x10])
            .section(".idata", 0x2000, imports.data)
            .directory(dir::IMPORT, 0x2000, imports.directory_size);
        let mut pe = open(&image);

        let header = pe
            .add_import_section(".idata2", &[("USER32.dll", &["MessageBoxW", "GetDC"])])
            .unwrap();

        assert_eq!(header.virtual_address, 0x3000);
        let directory = pe.data_directory(DataDirectoryType::Import).unwrap();
        assert_eq!(directory.virtual_address, 0x3000);
        assert_eq!(directory.size, 3 * 20);

        let libraries = pe.imports();
        assert_eq!(libraries.len(), 2);
        assert_eq!(libraries[0].library_name, "KERNEL32.DLL");
        assert!(libraries[0].position("ExitProcess").is_some());
        let user32 = pe.import_by_library("user32.dll").unwrap();
        assert_eq!(
            user32.function_names().collect::<Vec<_>>(),
            vec!["MessageBoxW", "GetDC"]
        );
        assert!(user32.positions[0].thunk_rva >= 0x3000);
    }

    #[test]
    fn import_section_without_imports() {
        let image = TestImage::new(false).section(".text", 0x1000, vec![0xC3; 0x10]);
        let mut pe = open(&image);

        pe.add_import_section(".idata", &[("KERNEL32.dll", &["Sleep"])])
            .unwrap();

        let libraries = pe.imports();
        assert_eq!(libraries.len(), 1);
        assert_eq!(libraries[0].positions[0].name, "Sleep");
        assert!(pe.add_import_section(".x", &[]).is_err());
    }

    #[test]
    fn relocs_section_merges() {
        let relocs = build_relocs(&[(0x1000, &[(0x3, 0x004)])]);
        let image = TestImage::new(false)
            .section(".text", 0x1000, vec![0x90; 0x100])
            .section(".reloc", 0x2000, relocs.clone())
            .directory(dir::BASERELOC, 0x2000, relocs.len() as u32);
        let mut pe = open(&image);

        let header = pe.add_relocs_section(".reloc2", &[0x1010, 0x1004]).unwrap();

        assert!(header.characteristics.contains(SectionFlags::MEM_DISCARDABLE));
        let directory = pe.data_directory(DataDirectoryType::BaseReloc).unwrap();
        assert_eq!(directory.virtual_address, header.virtual_address);
        assert_eq!(
            pe.relocs_as_rva_list().into_iter().collect::<Vec<_>>(),
            vec![0x1004, 0x1010]
        );
    }

    #[test]
    fn empty_relocs_are_rejected() {
        let mut pe = open(&TestImage::new(false).section(".text", 0x1000, vec![0x90; 0x10]));
        assert!(matches!(
            pe.add_relocs_section(".reloc", &[]),
            Err(Error::WriteLayoutFailed { .. })
        ));
    }
}
