//! Section table edits.
//!
//! New section headers are appended directly after the existing table. When the header area
//! (`SizeOfHeaders`) has no room left, it grows by whole file-alignment units and everything
//! behind it moves down by the same delta, so every stored raw pointer past the old header
//! end is patched: section raw pointers, the COFF symbol table, the Security directory and
//! each debug directory's `PointerToRawData`.

use crate::{
    pe::{
        constants::{
            DATA_DIRECTORY_SIZE, DEBUG_DIRECTORY_SIZE, DEFAULT_FILE_ALIGNMENT,
            DEFAULT_SECTION_ALIGNMENT, SECTION_HEADER_SIZE,
        },
        memmap::sanitize_alignment,
        DataDirectoryType, MapMode, PeFile, PeHeaders, SectionFlags, SectionHeader,
    },
    utils::{align_up, to_u32},
    Error, Result,
};

use super::plan::RewritePlan;

/// Offset of `SizeOfImage` inside the optional header.
const SIZE_OF_IMAGE: u64 = 56;
/// Offset of `SizeOfHeaders` inside the optional header.
const SIZE_OF_HEADERS: u64 = 60;
/// Offset of `NumberOfSections` inside the file header.
const NUMBER_OF_SECTIONS: u64 = 2;
/// Offset of `PointerToSymbolTable` inside the file header.
const POINTER_TO_SYMBOL_TABLE: u64 = 8;
/// Offset of `PointerToRawData` inside a section header.
const SECTION_RAW_POINTER: u64 = 20;

fn layout_error(message: impl Into<String>) -> Error {
    Error::WriteLayoutFailed {
        message: message.into(),
    }
}

/// Header area growth, maps original file offsets to their new location.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct HeaderGrowth {
    start: u64,
    delta: u64,
}

impl HeaderGrowth {
    pub(super) fn shift(&self, offset: u64) -> u64 {
        if self.delta != 0 && offset >= self.start {
            offset + self.delta
        } else {
            offset
        }
    }
}

/// Working copy of the headers a plan is built against.
#[derive(Debug, Clone)]
pub(super) struct SectionLayout {
    pub(super) headers: PeHeaders,
    pub(super) sections: Vec<SectionHeader>,
    pub(super) file_len: u64,
    pub(super) file_alignment: u64,
    pub(super) section_alignment: u64,
}

impl SectionLayout {
    fn extent(section: &SectionHeader) -> u64 {
        u64::from(section.virtual_size.max(section.size_of_raw_data))
    }

    /// End of the last section in memory, or the header size without sections.
    fn image_end(&self) -> u64 {
        self.sections
            .iter()
            .map(|section| u64::from(section.virtual_address) + Self::extent(section))
            .max()
            .unwrap_or(u64::from(self.headers.optional.size_of_headers))
    }

    /// RVA the next appended section is placed at.
    pub(super) fn next_section_rva(&self) -> u64 {
        align_up(self.image_end(), self.section_alignment)
    }

    fn size_of_image(&self) -> u64 {
        align_up(self.image_end(), self.section_alignment)
    }

    /// End of section raw data, clamped to the file.
    fn raw_end(&self) -> u64 {
        self.sections
            .iter()
            .filter(|section| section.size_of_raw_data != 0)
            .map(|section| {
                u64::from(section.pointer_to_raw_data) + u64::from(section.size_of_raw_data)
            })
            .max()
            .unwrap_or(0)
            .max(u64::from(self.headers.optional.size_of_headers))
            .min(self.file_len)
    }

    fn check_section_count(&self) -> Result<()> {
        if usize::from(self.headers.file.number_of_sections) != self.sections.len() {
            return Err(layout_error(format!(
                "section table holds {} entries but {} were parsed",
                self.headers.file.number_of_sections,
                self.sections.len()
            )));
        }
        Ok(())
    }

    /// Makes room for `extra` more section headers, growing the header area if needed.
    fn reserve_headers(
        &mut self,
        pe: &PeFile,
        plan: &mut RewritePlan,
        extra: u64,
    ) -> Result<HeaderGrowth> {
        let table_end = self.headers.section_table_end();
        let needed = table_end + extra * SECTION_HEADER_SIZE;
        let size_of_headers = u64::from(self.headers.optional.size_of_headers);

        let first_raw = self
            .sections
            .iter()
            .filter(|section| section.size_of_raw_data != 0 && section.pointer_to_raw_data != 0)
            .map(|section| u64::from(section.pointer_to_raw_data))
            .min()
            .unwrap_or(u64::MAX);

        self.clear_bound_imports(plan, table_end, needed);

        if needed <= size_of_headers.min(first_raw) {
            return Ok(HeaderGrowth::default());
        }
        if first_raw < size_of_headers {
            return Err(layout_error(format!(
                "section data at 0x{first_raw:x} lies inside the header area"
            )));
        }

        let new_size = align_up(needed, self.file_alignment);
        let first_rva = self
            .sections
            .iter()
            .map(|section| u64::from(section.virtual_address))
            .min()
            .unwrap_or(u64::MAX);
        if new_size > first_rva {
            return Err(layout_error(format!(
                "headers of 0x{new_size:x} bytes would overlap the first section at 0x{first_rva:x}"
            )));
        }

        let growth = HeaderGrowth {
            start: size_of_headers,
            delta: new_size - size_of_headers,
        };
        log::debug!(
            "growing headers 0x{size_of_headers:x} -> 0x{new_size:x}, shifting 0x{:x} bytes",
            self.file_len.saturating_sub(size_of_headers)
        );

        if self.file_len > size_of_headers {
            plan.resize(self.file_len + growth.delta)
                .move_range(
                    size_of_headers,
                    self.file_len - size_of_headers,
                    size_of_headers + growth.delta,
                )
                .fill(size_of_headers, growth.delta);
        } else {
            plan.resize(new_size).fill(self.file_len, new_size - self.file_len);
        }

        plan.patch_u32(
            self.headers.offsets.optional_header + SIZE_OF_HEADERS,
            to_u32(new_size)?,
        );

        for (index, section) in self.sections.iter_mut().enumerate() {
            let pointer = u64::from(section.pointer_to_raw_data);
            if pointer != 0 && pointer >= growth.start {
                section.pointer_to_raw_data = to_u32(growth.shift(pointer))?;
                plan.patch_u32(
                    self.headers.section_header_offset(index) + SECTION_RAW_POINTER,
                    section.pointer_to_raw_data,
                );
            }
        }

        let symbols = u64::from(self.headers.file.pointer_to_symbol_table);
        if symbols >= growth.start {
            plan.patch_u32(
                self.headers.offsets.file_header + POINTER_TO_SYMBOL_TABLE,
                to_u32(growth.shift(symbols))?,
            );
        }

        self.relocate_security(plan, |offset| growth.shift(offset))?;
        self.shift_debug_pointers(pe, plan, growth)?;
        self.headers.optional.size_of_headers = to_u32(new_size)?;
        self.file_len += growth.delta;

        Ok(growth)
    }

    /// Re-points the Security directory, which holds a file offset instead of an RVA.
    fn relocate_security(
        &self,
        plan: &mut RewritePlan,
        relocate: impl Fn(u64) -> u64,
    ) -> Result<()> {
        let security = self.headers.directory(DataDirectoryType::Security);
        if security.is_empty() {
            return Ok(());
        }

        let from = u64::from(security.virtual_address);
        let to = relocate(from);
        if to != from {
            plan.patch_u32(
                self.headers.directory_entry_offset(DataDirectoryType::Security),
                to_u32(to)?,
            );
        }
        Ok(())
    }

    /// Bound imports usually sit right behind the section table and would be overwritten.
    fn clear_bound_imports(&self, plan: &mut RewritePlan, start: u64, end: u64) {
        let bound = self.headers.directory(DataDirectoryType::BoundImport);
        if bound.is_empty() {
            return;
        }

        let bound_start = u64::from(bound.virtual_address);
        let bound_end = bound_start + u64::from(bound.size);
        if bound_start < end && start < bound_end {
            log::debug!("dropping bound imports at 0x{bound_start:x} to make room for section headers");
            plan.patch(
                self.headers.directory_entry_offset(DataDirectoryType::BoundImport),
                DATA_DIRECTORY_SIZE as u8,
                0,
            );
        }
    }

    fn shift_debug_pointers(
        &self,
        pe: &PeFile,
        plan: &mut RewritePlan,
        growth: HeaderGrowth,
    ) -> Result<()> {
        let debug = self.headers.directory(DataDirectoryType::Debug);
        if debug.is_empty() {
            return Ok(());
        }

        let map = pe.memory_map(MapMode::File);
        let count = (u64::from(debug.size) / DEBUG_DIRECTORY_SIZE)
            .min(pe.options().limits.max_debug_entries as u64);
        for index in 0..count {
            let rva = u64::from(debug.virtual_address) + index * DEBUG_DIRECTORY_SIZE;
            let Some(entry) = map.rel_address_to_offset(rva) else {
                break;
            };
            let Ok(pointer) = pe.file().read_u32(entry + 24, false) else {
                break;
            };
            let pointer = u64::from(pointer);
            if pointer != 0 && pointer >= growth.start {
                plan.patch_u32(growth.shift(entry) + 24, to_u32(growth.shift(pointer))?);
            }
        }

        Ok(())
    }

    fn patch_counts(&self, plan: &mut RewritePlan) -> Result<()> {
        let count = u16::try_from(self.sections.len())
            .map_err(|_| layout_error("too many sections"))?;
        plan.patch_u16(
            self.headers.offsets.file_header + NUMBER_OF_SECTIONS,
            count,
        );
        plan.patch_u32(
            self.headers.offsets.optional_header + SIZE_OF_IMAGE,
            to_u32(self.size_of_image())?,
        );
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.len() > 8 {
        return Err(layout_error(format!(
            "section name {name:?} is longer than 8 bytes"
        )));
    }
    Ok(())
}

impl PeFile {
    pub(super) fn section_layout(&self) -> Result<SectionLayout> {
        let headers = self.headers().ok_or(Error::NotSupported)?.clone();
        Ok(SectionLayout {
            sections: headers.sections.clone(),
            file_len: self.file().len() as u64,
            file_alignment: u64::from(sanitize_alignment(
                headers.optional.file_alignment,
                DEFAULT_FILE_ALIGNMENT,
            )),
            section_alignment: u64::from(sanitize_alignment(
                headers.optional.section_alignment,
                DEFAULT_SECTION_ALIGNMENT,
            )),
            headers,
        })
    }

    /// Builds the plan appending a section holding `data`, without applying it.
    ///
    /// The section is placed at the next section-aligned RVA and the next file-aligned offset
    /// after the existing raw data; an overlay moves behind it.
    ///
    /// # Errors
    /// Returns [`Error::WriteLayoutFailed`] if the name is too long, `data` is empty or the
    /// headers cannot grow, and [`Error::NotSupported`] for invalid images.
    pub fn plan_add_section(
        &self,
        name: &str,
        data: &[u8],
        flags: SectionFlags,
    ) -> Result<(RewritePlan, SectionHeader)> {
        validate_name(name)?;
        if data.is_empty() {
            return Err(layout_error("section data is empty"));
        }

        let mut layout = self.section_layout()?;
        layout.check_section_count()?;

        let original_len = layout.file_len;
        let raw_end = layout.raw_end();
        let overlay_len = original_len - raw_end;

        let mut plan = RewritePlan::new(original_len);
        let growth = layout.reserve_headers(self, &mut plan, 1)?;

        let pointer = align_up(growth.shift(raw_end), layout.file_alignment);
        let raw_size = align_up(data.len() as u64, layout.file_alignment);
        let virtual_address = layout.next_section_rva();

        let mut header = SectionHeader::with_name(name);
        header.virtual_size = to_u32(data.len() as u64)?;
        header.virtual_address = to_u32(virtual_address)?;
        header.size_of_raw_data = to_u32(raw_size)?;
        header.pointer_to_raw_data = to_u32(pointer)?;
        header.characteristics = flags;

        plan.resize(pointer + raw_size + overlay_len)
            .move_range(raw_end, overlay_len, pointer + raw_size)
            .fill(pointer, raw_size)
            .patch_bytes(pointer, data.to_vec())
            .patch_bytes(layout.headers.section_table_end(), header.to_bytes().to_vec());

        layout.relocate_security(&mut plan, |offset| {
            if offset >= raw_end {
                offset - raw_end + pointer + raw_size
            } else {
                growth.shift(offset)
            }
        })?;

        layout.sections.push(header);
        layout.patch_counts(&mut plan)?;

        Ok((plan, header))
    }

    /// Appends a section holding `data` and returns its header.
    ///
    /// # Errors
    /// See [`PeFile::plan_add_section`]; read-only backends fail with [`Error::NotSupported`].
    pub fn add_section(
        &mut self,
        name: &str,
        data: &[u8],
        flags: SectionFlags,
    ) -> Result<SectionHeader> {
        let (plan, header) = self.plan_add_section(name, data, flags)?;
        self.apply_plan(&plan)?;
        log::debug!(
            "added section {name} at rva 0x{:x}, offset 0x{:x}",
            header.virtual_address,
            header.pointer_to_raw_data
        );
        Ok(header)
    }

    /// Removes the last section header and returns it.
    ///
    /// The raw data is cut only when it is the last section data in the file; an overlay behind
    /// it moves back. Data directories pointing into the removed section are cleared.
    ///
    /// # Errors
    /// Returns [`Error::WriteLayoutFailed`] when there is no section to remove.
    pub fn remove_last_section(&mut self) -> Result<SectionHeader> {
        let mut layout = self.section_layout()?;
        layout.check_section_count()?;
        let Some(removed) = layout.sections.pop() else {
            return Err(layout_error("image has no sections"));
        };
        let index = layout.sections.len();

        let mut plan = RewritePlan::new(layout.file_len);

        let start = u64::from(removed.pointer_to_raw_data);
        let end = (start + u64::from(removed.size_of_raw_data)).min(layout.file_len);
        let last_in_file = removed.size_of_raw_data != 0
            && start < layout.file_len
            && layout.raw_end() <= start;
        if last_in_file {
            let overlay_len = layout.file_len - end;
            plan.move_range(end, overlay_len, start)
                .resize(start + overlay_len);
            layout.relocate_security(&mut plan, |offset| {
                if offset >= end {
                    offset - (end - start)
                } else {
                    offset
                }
            })?;
        }

        plan.fill(layout.headers.section_header_offset(index), SECTION_HEADER_SIZE);
        layout.patch_counts(&mut plan)?;

        for (slot, directory) in layout.headers.data_directories.iter().enumerate() {
            let Some(kind) = DataDirectoryType::from_repr(slot) else {
                continue;
            };
            if kind == DataDirectoryType::Security || directory.is_empty() {
                continue;
            }
            if removed.contains_rva(directory.virtual_address) {
                log::debug!("clearing {kind} directory inside removed section");
                plan.patch(
                    layout.headers.directory_entry_offset(kind),
                    DATA_DIRECTORY_SIZE as u8,
                    0,
                );
            }
        }

        self.apply_plan(&plan)?;
        Ok(removed)
    }

    /// Splits section `index` at `offset` bytes into two sections, the second named `name`.
    ///
    /// `offset` must be a non-zero multiple of the section alignment inside the section. Both
    /// halves keep the original characteristics; RVAs and raw bytes do not move.
    ///
    /// # Errors
    /// Returns [`Error::WriteLayoutFailed`] for a bad index, offset or name.
    pub fn split_section(
        &mut self,
        index: usize,
        offset: u32,
        name: &str,
    ) -> Result<(SectionHeader, SectionHeader)> {
        validate_name(name)?;
        let mut layout = self.section_layout()?;
        layout.check_section_count()?;

        let Some(original) = layout.sections.get(index).copied() else {
            return Err(layout_error(format!("no section at index {index}")));
        };
        let extent = SectionLayout::extent(&original);
        let at = u64::from(offset);
        if at == 0 || at >= extent {
            return Err(layout_error(format!(
                "split offset 0x{offset:x} outside section of 0x{extent:x} bytes"
            )));
        }
        if at % layout.section_alignment != 0 || at % layout.file_alignment != 0 {
            return Err(layout_error(format!(
                "split offset 0x{offset:x} is not section aligned"
            )));
        }

        let mut plan = RewritePlan::new(layout.file_len);
        layout.reserve_headers(self, &mut plan, 1)?;
        // pointer may have moved with the headers
        let original = layout.sections[index];

        let mut first = original;
        let mut second = SectionHeader::with_name(name);
        second.characteristics = original.characteristics;
        second.virtual_address = original.virtual_address + offset;

        first.virtual_size = original.virtual_size.min(offset);
        second.virtual_size = original.virtual_size.saturating_sub(offset);

        if original.size_of_raw_data > offset {
            first.size_of_raw_data = offset;
            second.size_of_raw_data = original.size_of_raw_data - offset;
            second.pointer_to_raw_data = original.pointer_to_raw_data + offset;
        }

        layout.sections[index] = first;
        layout.sections.insert(index + 1, second);
        for (slot, header) in layout.sections.iter().enumerate().skip(index) {
            plan.patch_bytes(
                layout.headers.section_header_offset(slot),
                header.to_bytes().to_vec(),
            );
        }
        layout.patch_counts(&mut plan)?;

        self.apply_plan(&plan)?;
        Ok((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{dir, open, TestImage};

    fn image() -> TestImage {
        TestImage::new(true)
            .section(".text", 0x1000, vec![0xC3; 0x180])
            .section(".data", 0x2000, vec![0x11; 0x200])
            .overlay(b"OVERLAY!".to_vec())
    }

    fn flags() -> SectionFlags {
        SectionFlags::CNT_INITIALIZED_DATA | SectionFlags::MEM_READ
    }

    #[test]
    fn add_section_appends_data() {
        let mut pe = open(&image());
        let before = pe.file().len();

        let header = pe.add_section(".new", &[0xAB; 0x30], flags()).unwrap();

        assert_eq!(header.virtual_address, 0x3000);
        assert_eq!(header.pointer_to_raw_data, 0x800);
        assert_eq!(header.size_of_raw_data, 0x200);
        assert_eq!(pe.file().len(), before + 0x200);

        let headers = pe.headers().unwrap();
        assert_eq!(headers.sections.len(), 3);
        assert_eq!(headers.sections[2].name_str(), ".new");
        assert_eq!(headers.optional.size_of_image, 0x4000);

        let offset = pe.rva_to_offset(0x3000).unwrap() as usize;
        assert_eq!(&pe.data()[offset..offset + 0x30], &[0xAB; 0x30]);
        assert_eq!(pe.data()[offset + 0x30], 0);
        assert!(pe.data().ends_with(b"OVERLAY!"));
    }

    #[test]
    fn add_then_remove_restores_layout() {
        let original = image().build();
        let mut pe = open(&image());

        pe.add_section(".new", &[0xAB; 0x30], flags()).unwrap();
        let removed = pe.remove_last_section().unwrap();

        assert_eq!(removed.name_str(), ".new");
        assert_eq!(pe.data(), original.as_slice());
    }

    #[test]
    fn add_section_grows_headers() {
        // 0x178 + 3 * 40 = 0x1F0, no room for a fourth header below 0x200
        let image = TestImage::new(false)
            .size_of_headers(0x200)
            .section(".text", 0x1000, vec![0xC3; 0x10])
            .section(".rdata", 0x2000, vec![0x22; 0x10])
            .section(".data", 0x3000, vec![0x33; 0x10])
            .overlay(vec![0xEE; 4]);
        assert_eq!(image.section_table_offset(), 0x178);
        let mut pe = open(&image);

        pe.add_section(".new", &[0x44; 0x10], flags()).unwrap();

        let headers = pe.headers().unwrap();
        assert_eq!(headers.optional.size_of_headers, 0x400);
        assert_eq!(headers.sections[0].pointer_to_raw_data, 0x400);
        assert_eq!(headers.sections[3].pointer_to_raw_data, 0xA00);

        for (rva, byte) in [(0x1000u32, 0xC3u8), (0x2000, 0x22), (0x3000, 0x33), (0x4000, 0x44)] {
            let offset = pe.rva_to_offset(rva).unwrap() as usize;
            assert_eq!(pe.data()[offset], byte);
        }
        assert!(pe.data().ends_with(&[0xEE; 4]));
        // the gap left by the growth is zeroed
        assert!(pe.data()[0x218..0x400].iter().all(|&b| b == 0));
    }

    #[test]
    fn growth_shifts_security_directory() {
        let image = TestImage::new(false)
            .size_of_headers(0x200)
            .section(".text", 0x1000, vec![0xC3; 0x10])
            .section(".rdata", 0x2000, vec![0x22; 0x10])
            .section(".data", 0x3000, vec![0x33; 0x10])
            .overlay(vec![0x55; 0x10])
            .directory(dir::SECURITY, 0x800, 0x10);
        let mut pe = open(&image);

        pe.add_section(".new", &[0x44; 0x10], flags()).unwrap();

        let security = pe.data_directory(DataDirectoryType::Security).unwrap();
        assert_eq!(security.virtual_address, 0xC00);
        assert_eq!(pe.data()[0xC00], 0x55);
    }

    #[test]
    fn remove_clears_directories() {
        let mut pe = open(&image().directory(dir::IMPORT, 0x2010, 0x28));
        pe.remove_last_section().unwrap();

        assert!(pe.data_directory(DataDirectoryType::Import).is_none());
        assert_eq!(pe.sections().len(), 1);
        assert_eq!(pe.headers().unwrap().optional.size_of_image, 0x2000);
        assert!(pe.data().ends_with(b"OVERLAY!"));
    }

    #[test]
    fn split_section_keeps_bytes() {
        let mut data = vec![0x01; 0x1000];
        data.extend(vec![0x02; 0x400]);
        let image = TestImage::new(true)
            .file_alignment(0x200)
            .section(".text", 0x1000, data)
            .section(".data", 0x3000, vec![0x03; 0x10]);
        let mut pe = open(&image);

        let (first, second) = pe.split_section(0, 0x1000, ".text2").unwrap();

        assert_eq!(first.virtual_size, 0x1000);
        assert_eq!(second.virtual_address, 0x2000);
        assert_eq!(second.virtual_size, 0x400);
        assert_eq!(second.pointer_to_raw_data, first.pointer_to_raw_data + 0x1000);

        let sections = pe.sections();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].name_str(), ".text2");
        assert_eq!(sections[2].name_str(), ".data");

        let offset = pe.rva_to_offset(0x2000).unwrap() as usize;
        assert_eq!(pe.data()[offset], 0x02);
    }

    #[test]
    fn invalid_requests_leave_image_untouched() {
        let original = image().build();
        let mut pe = open(&image());

        assert!(pe.add_section(".too_long_name", &[1], flags()).is_err());
        assert!(pe.add_section(".empty", &[], flags()).is_err());
        assert!(pe.split_section(0, 0x100, ".x").is_err());
        assert!(pe.split_section(9, 0x1000, ".x").is_err());
        assert_eq!(pe.data(), original.as_slice());
    }

    #[test]
    fn invalid_image_is_not_supported() {
        let mut pe = PeFile::from_mem(vec![0u8; 0x100]).unwrap();
        assert!(matches!(
            pe.add_section(".x", &[1], flags()),
            Err(Error::NotSupported)
        ));
    }
}
