//! Memory map construction and address translation.
//!
//! A PE image lives in two coordinate spaces: raw file offsets on disk and virtual addresses
//! once the loader has mapped it. The [`MemoryMap`] is an ordered list of [`Region`]s
//! reconciling both: the headers, every section (split into a file-backed part and a purely
//! virtual tail), and the overlay appended after the last mapped section.
//!
//! Maps are built in one of two [`MapMode`]s:
//!
//! - [`MapMode::File`] describes the on-disk layout. Sections are placed at their
//!   `PointerToRawData`, bytes that only exist in memory become virtual-only regions, and the
//!   trailing bytes no section claims become the overlay.
//! - [`MapMode::Image`] describes a memory dump of a loaded module, where every byte sits at
//!   its RVA. File offsets equal RVAs and neither overlay nor virtual-only regions exist.
//!
//! Corrupted headers are corrected rather than rejected: out-of-range alignments are replaced
//! by the architecture defaults, raw pointers past the end of file contribute no bytes, raw
//! sizes running past the end of file are clamped, and overlapping candidates are carved so
//! that no two regions ever overlap in the same coordinate space.
//!
//! Translation is total: [`MemoryMap::address_to_offset`], [`MemoryMap::offset_to_address`]
//! and [`MemoryMap::rel_address_to_offset`] return `None` for unmapped input.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::{MapMode, PeFile};
//! use std::path::Path;
//!
//! let pe = PeFile::from_file(Path::new("sample.exe"))?;
//! let map = pe.memory_map(MapMode::File);
//! for region in &map.regions {
//!     println!("{:<8} {:?} {:?} 0x{:x}", region.name, region.file_offset, region.virtual_address, region.size);
//! }
//! if let Some(offset) = map.rel_address_to_offset(0x1000) {
//!     println!("RVA 0x1000 is at file offset 0x{offset:x}");
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

use strum::Display;

use crate::{
    pe::{
        constants::{DEFAULT_FILE_ALIGNMENT, DEFAULT_SECTION_ALIGNMENT, MAX_ALIGNMENT},
        headers::PeHeaders,
    },
    utils::align_up,
};

/// Coordinate space of the input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum MapMode {
    /// Raw on-disk layout
    #[default]
    File,
    /// Loaded image dump, byte at offset `n` is the byte at RVA `n`
    Image,
}

/// Native word size of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Bitness {
    /// PE32
    #[strum(serialize = "32-bit")]
    Bits32,
    /// PE32+
    #[strum(serialize = "64-bit")]
    Bits64,
}

/// Byte order of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Endianness {
    /// Little-endian
    Little,
    /// Big-endian
    Big,
}

/// What a [`Region`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RegionKind {
    /// DOS stub, NT headers and section table
    Header,
    /// A section
    LoadSegment,
    /// Bytes after the last mapped section
    Overlay,
    /// A table inside another region
    Table,
    /// Generic data
    Data,
    /// A format specific object
    Object,
}

/// One span of the image in both coordinate spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// What the span covers
    pub kind: RegionKind,
    /// File offset of the first byte, `None` if the span has no file bytes
    pub file_offset: Option<u64>,
    /// Absolute virtual address of the first byte, `None` if the span is not loaded
    pub virtual_address: Option<u64>,
    /// Size in bytes
    pub size: u64,
    /// The span exists only in memory (zero-filled by the loader)
    pub is_virtual_only: bool,
    /// Display name
    pub name: String,
    /// Index into the section table for section regions
    pub section_index: Option<usize>,
}

impl Region {
    /// Returns `true` if `address` lies in the virtual span.
    #[must_use]
    pub fn contains_address(&self, address: u64) -> bool {
        self.virtual_address
            .is_some_and(|start| address >= start && address - start < self.size)
    }

    /// Returns `true` if `offset` lies in the file span.
    #[must_use]
    pub fn contains_offset(&self, offset: u64) -> bool {
        self.file_offset
            .is_some_and(|start| offset >= start && offset - start < self.size)
    }
}

/// The region list of an image together with its global properties.
///
/// Built fresh for every query; a map computed before a mutation is stale afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    /// Size of the backing store
    pub binary_size: u64,
    /// Size of the loaded image
    pub image_size: u64,
    /// Word size
    pub bitness: Bitness,
    /// Byte order
    pub endianness: Endianness,
    /// Absolute address of the entry point
    pub entry_point_address: u64,
    /// Address the image is considered loaded at
    pub module_base_address: u64,
    /// Coordinate space of the backing store
    pub mode: MapMode,
    /// File alignment after clamping
    pub file_alignment: u32,
    /// Section alignment after clamping
    pub section_alignment: u32,
    /// Regions in header, section, overlay order
    pub regions: Vec<Region>,
}

/// Replaces an alignment of zero or above 64K by `default`.
#[must_use]
pub fn sanitize_alignment(value: u32, default: u32) -> u32 {
    if value == 0 || value > MAX_ALIGNMENT {
        log::debug!("alignment 0x{value:x} replaced by 0x{default:x}");
        default
    } else {
        value
    }
}

struct Candidate {
    kind: RegionKind,
    file_offset: Option<u64>,
    virtual_address: Option<u64>,
    size: u64,
    is_virtual_only: bool,
    name: String,
    section_index: Option<usize>,
}

fn overlap(start: u64, size: u64, other_start: u64, other_size: u64) -> Option<(u64, u64)> {
    let begin = start.max(other_start);
    let end = start.saturating_add(size).min(other_start.saturating_add(other_size));
    (begin < end).then(|| (begin - start, end - start))
}

fn subtract(pieces: Vec<(u64, u64)>, cut: (u64, u64)) -> Vec<(u64, u64)> {
    let mut out = Vec::with_capacity(pieces.len() + 1);
    for (start, end) in pieces {
        if cut.1 <= start || cut.0 >= end {
            out.push((start, end));
            continue;
        }
        if start < cut.0 {
            out.push((start, cut.0));
        }
        if cut.1 < end {
            out.push((cut.1, end));
        }
    }
    out
}

impl MemoryMap {
    /// Builds the map of an image from its parsed headers.
    ///
    /// `module_base` overrides the header's `ImageBase` for all virtual addresses.
    #[must_use]
    pub fn build(
        binary_size: u64,
        headers: &PeHeaders,
        mode: MapMode,
        module_base: Option<u64>,
    ) -> MemoryMap {
        let optional = &headers.optional;
        let file_alignment = sanitize_alignment(optional.file_alignment, DEFAULT_FILE_ALIGNMENT);
        let section_alignment =
            sanitize_alignment(optional.section_alignment, DEFAULT_SECTION_ALIGNMENT);
        let sa = u64::from(section_alignment);
        let base = module_base.unwrap_or(optional.image_base);

        let mut map = MemoryMap {
            binary_size,
            image_size: 0,
            bitness: if optional.is_64 {
                Bitness::Bits64
            } else {
                Bitness::Bits32
            },
            endianness: Endianness::Little,
            entry_point_address: base.wrapping_add(u64::from(optional.address_of_entry_point)),
            module_base_address: base,
            mode,
            file_alignment,
            section_alignment,
            regions: Vec::new(),
        };

        let stored_headers = if optional.size_of_headers == 0 {
            headers.section_table_end()
        } else {
            u64::from(optional.size_of_headers)
        };
        let header_size = match mode {
            MapMode::Image => align_up(stored_headers, sa),
            MapMode::File => stored_headers.min(binary_size),
        };
        map.push_carved(Candidate {
            kind: RegionKind::Header,
            file_offset: Some(0),
            virtual_address: Some(base),
            size: header_size,
            is_virtual_only: false,
            name: "Header".to_string(),
            section_index: None,
        });

        for (index, section) in headers.sections.iter().enumerate() {
            let name = section.name_str();
            let rva = u64::from(section.virtual_address);
            let va = base.wrapping_add(rva);
            let virtual_size = if section.virtual_size == 0 {
                u64::from(section.size_of_raw_data)
            } else {
                u64::from(section.virtual_size)
            };

            match mode {
                MapMode::Image => {
                    map.push_carved(Candidate {
                        kind: RegionKind::LoadSegment,
                        file_offset: Some(rva),
                        virtual_address: Some(va),
                        size: align_up(virtual_size, sa),
                        is_virtual_only: false,
                        name,
                        section_index: Some(index),
                    });
                }
                MapMode::File => {
                    let raw_offset = u64::from(section.pointer_to_raw_data);
                    let raw_size = if raw_offset >= binary_size {
                        if section.size_of_raw_data != 0 {
                            log::debug!("section {name} raw pointer 0x{raw_offset:x} past end of file");
                        }
                        0
                    } else {
                        u64::from(section.size_of_raw_data).min(binary_size - raw_offset)
                    };
                    let mapped = raw_size.min(align_up(virtual_size, sa));

                    if mapped > 0 {
                        map.push_carved(Candidate {
                            kind: RegionKind::LoadSegment,
                            file_offset: Some(raw_offset),
                            virtual_address: Some(va),
                            size: mapped,
                            is_virtual_only: false,
                            name: name.clone(),
                            section_index: Some(index),
                        });
                    }

                    if virtual_size > mapped {
                        map.push_carved(Candidate {
                            kind: RegionKind::LoadSegment,
                            file_offset: None,
                            virtual_address: Some(va.wrapping_add(mapped)),
                            size: virtual_size - mapped,
                            is_virtual_only: true,
                            name,
                            section_index: Some(index),
                        });
                    }
                }
            }
        }

        if mode == MapMode::File {
            let mapped_end = map
                .regions
                .iter()
                .filter_map(|r| r.file_offset.map(|o| o.saturating_add(r.size)))
                .max()
                .unwrap_or(0);
            if mapped_end < binary_size {
                map.regions.push(Region {
                    kind: RegionKind::Overlay,
                    file_offset: Some(mapped_end),
                    virtual_address: None,
                    size: binary_size - mapped_end,
                    is_virtual_only: false,
                    name: "Overlay".to_string(),
                    section_index: None,
                });
            }
        }

        let computed_end = map
            .regions
            .iter()
            .filter_map(|r| r.virtual_address.map(|v| v.saturating_add(r.size)))
            .max()
            .unwrap_or(base);
        map.image_size = if optional.size_of_image == 0 {
            align_up(computed_end.saturating_sub(base), sa)
        } else {
            u64::from(optional.size_of_image)
        };

        map
    }

    /// Emits the parts of `candidate` that overlap no existing region in either space.
    fn push_carved(&mut self, candidate: Candidate) {
        if candidate.size == 0 {
            return;
        }

        let mut pieces = vec![(0, candidate.size)];
        for region in &self.regions {
            if let (Some(va), Some(other)) = (candidate.virtual_address, region.virtual_address) {
                if let Some(cut) = overlap(va, candidate.size, other, region.size) {
                    pieces = subtract(pieces, cut);
                }
            }
            if let (Some(offset), Some(other)) = (candidate.file_offset, region.file_offset) {
                if let Some(cut) = overlap(offset, candidate.size, other, region.size) {
                    pieces = subtract(pieces, cut);
                }
            }
        }

        if pieces.len() != 1 || pieces[0] != (0, candidate.size) {
            log::debug!("region {} carved into {} piece(s)", candidate.name, pieces.len());
        }

        for (start, end) in pieces {
            self.regions.push(Region {
                kind: candidate.kind,
                file_offset: candidate.file_offset.map(|o| o + start),
                virtual_address: candidate.virtual_address.map(|v| v + start),
                size: end - start,
                is_virtual_only: candidate.is_virtual_only,
                name: candidate.name.clone(),
                section_index: candidate.section_index,
            });
        }
    }

    /// Returns `true` for PE32+ images.
    #[must_use]
    pub fn is_64(&self) -> bool {
        self.bitness == Bitness::Bits64
    }

    /// Returns the region whose virtual span contains `address`.
    #[must_use]
    pub fn region_for_address(&self, address: u64) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains_address(address))
    }

    /// Returns the region whose file span contains `offset`.
    #[must_use]
    pub fn region_for_offset(&self, offset: u64) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains_offset(offset))
    }

    /// Translates an absolute virtual address into a file offset.
    ///
    /// Returns `None` for addresses in virtual-only regions or outside every region.
    #[must_use]
    pub fn address_to_offset(&self, address: u64) -> Option<u64> {
        let region = self.region_for_address(address)?;
        if region.is_virtual_only {
            return None;
        }
        let start = region.virtual_address?;
        region.file_offset.map(|offset| offset + (address - start))
    }

    /// Translates a file offset into an absolute virtual address.
    ///
    /// Returns `None` for overlay bytes and offsets outside every region.
    #[must_use]
    pub fn offset_to_address(&self, offset: u64) -> Option<u64> {
        let region = self.region_for_offset(offset)?;
        let start = region.file_offset?;
        region.virtual_address.map(|va| va + (offset - start))
    }

    /// Translates an RVA into a file offset.
    #[must_use]
    pub fn rel_address_to_offset(&self, rva: u64) -> Option<u64> {
        self.address_to_offset(self.module_base_address.checked_add(rva)?)
    }

    /// Translates a file offset into an RVA.
    #[must_use]
    pub fn offset_to_rel_address(&self, offset: u64) -> Option<u64> {
        self.offset_to_address(offset)
            .and_then(|va| va.checked_sub(self.module_base_address))
    }

    /// Returns `true` if `rva` lies in any loaded region, including virtual-only ones.
    #[must_use]
    pub fn contains_rel_address(&self, rva: u64) -> bool {
        self.module_base_address
            .checked_add(rva)
            .is_some_and(|va| self.region_for_address(va).is_some())
    }

    /// The overlay region, if any.
    #[must_use]
    pub fn overlay(&self) -> Option<&Region> {
        self.regions.iter().find(|r| r.kind == RegionKind::Overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ParseLimits,
        file::File,
        test::{dir, TestImage},
    };

    fn map_of(image: &TestImage, mode: MapMode) -> MemoryMap {
        let bytes = image.build();
        let file = File::from_mem(bytes).unwrap();
        let headers = PeHeaders::parse(&file, &ParseLimits::default()).unwrap();
        MemoryMap::build(file.len() as u64, &headers, mode, None)
    }

    fn assert_no_overlap(map: &MemoryMap) {
        for (i, a) in map.regions.iter().enumerate() {
            for b in map.regions.iter().skip(i + 1) {
                if let (Some(x), Some(y)) = (a.file_offset, b.file_offset) {
                    assert!(overlap(x, a.size, y, b.size).is_none(), "{a:?} / {b:?}");
                }
                if let (Some(x), Some(y)) = (a.virtual_address, b.virtual_address) {
                    assert!(overlap(x, a.size, y, b.size).is_none(), "{a:?} / {b:?}");
                }
            }
        }
    }

    #[test]
    fn file_mode_layout() {
        let image = TestImage::new(false)
            .section(".text", 0x1000, vec![0x90; 0x300])
            .section_with(".bss", 0x2000, vec![0x00; 0x200], 0x1800, 0xC000_0080)
            .overlay(vec![0xEE; 0x55]);
        let map = map_of(&image, MapMode::File);

        assert_eq!(map.bitness, Bitness::Bits32);
        assert_eq!(map.module_base_address, 0x40_0000);
        assert_eq!(map.regions[0].kind, RegionKind::Header);
        assert_eq!(map.regions[0].size, 0x400);

        let text = &map.regions[1];
        assert_eq!(text.name, ".text");
        assert_eq!(text.file_offset, Some(0x400));
        assert_eq!(text.virtual_address, Some(0x40_1000));
        // raw data rounded to the file alignment is mapped up to the aligned virtual size
        assert_eq!(text.size, 0x400);

        let bss_virtual = map
            .regions
            .iter()
            .find(|r| r.name == ".bss" && r.is_virtual_only)
            .unwrap();
        assert_eq!(bss_virtual.virtual_address, Some(0x40_2200));
        assert_eq!(bss_virtual.size, 0x1600);
        assert_eq!(bss_virtual.file_offset, None);

        let overlay = map.overlay().unwrap();
        assert_eq!(overlay.file_offset, Some(0x400 + 0x400 + 0x200));
        assert_eq!(overlay.size, 0x55);
        assert_no_overlap(&map);
    }

    #[test]
    fn translation_roundtrip() {
        let image = TestImage::new(true)
            .section(".text", 0x1000, vec![0xCC; 0x280])
            .section(".rdata", 0x2000, vec![0x11; 0x80]);
        let map = map_of(&image, MapMode::File);

        assert_eq!(map.rel_address_to_offset(0x1010), Some(0x410));
        assert_eq!(map.offset_to_rel_address(0x410), Some(0x1010));

        for region in map.regions.iter().filter(|r| !r.is_virtual_only) {
            let (Some(offset), Some(_)) = (region.file_offset, region.virtual_address) else {
                continue;
            };
            for probe in [offset, offset + region.size / 2, offset + region.size - 1] {
                let va = map.offset_to_address(probe).unwrap();
                assert_eq!(map.address_to_offset(va), Some(probe));
            }
        }
    }

    #[test]
    fn virtual_only_does_not_translate() {
        let image = TestImage::new(false).section_with(".data", 0x1000, vec![1; 0x10], 0x3000, 0);
        let map = map_of(&image, MapMode::File);

        assert!(map.rel_address_to_offset(0x1008).is_some());
        assert_eq!(map.rel_address_to_offset(0x2000), None);
        assert!(map.contains_rel_address(0x2000));
        assert_eq!(map.rel_address_to_offset(0x9000), None);
    }

    #[test]
    fn zero_section_alignment_defaults() {
        let image = TestImage::new(false)
            .section_alignment(0)
            .file_alignment(0x20000)
            .section(".text", 0x1000, vec![0x90; 0x10]);
        let map = map_of(&image, MapMode::Image);

        assert_eq!(map.section_alignment, 0x1000);
        assert_eq!(map.file_alignment, 0x200);
        assert_eq!(map.regions[0].size, 0x1000);
        assert_eq!(map.regions[1].size, 0x1000);
    }

    #[test]
    fn image_mode_offsets_are_rvas() {
        let image = TestImage::new(false)
            .section(".text", 0x1000, vec![0x90; 0x10])
            .overlay(vec![0; 0x100]);
        let bytes = image.build();
        let file = File::from_mem(bytes).unwrap();
        let headers = PeHeaders::parse(&file, &ParseLimits::default()).unwrap();
        let map = MemoryMap::build(file.len() as u64, &headers, MapMode::Image, Some(0x7000_0000));

        assert_eq!(map.module_base_address, 0x7000_0000);
        assert_eq!(map.rel_address_to_offset(0x1004), Some(0x1004));
        assert!(map.overlay().is_none());
        assert!(map.regions.iter().all(|r| !r.is_virtual_only));
    }

    #[test]
    fn raw_pointer_past_eof() {
        let image = TestImage::new(false)
            .section(".text", 0x1000, vec![0x90; 0x200])
            .section(".bad", 0x2000, vec![0x00; 0x10])
            .raw_override(Some(0x00FF_0000), Some(0x200));
        let map = map_of(&image, MapMode::File);

        let bad: Vec<_> = map.regions.iter().filter(|r| r.name == ".bad").collect();
        assert_eq!(bad.len(), 1);
        assert!(bad[0].is_virtual_only);
        assert_eq!(bad[0].size, 0x10);
    }

    #[test]
    fn raw_size_past_eof_is_clamped() {
        let image = TestImage::new(false)
            .section(".text", 0x1000, vec![0x90; 0x200])
            .raw_override(None, Some(0x10_0000));
        let map = map_of(&image, MapMode::File);

        let text = map.regions.iter().find(|r| r.name == ".text").unwrap();
        assert_eq!(text.file_offset, Some(0x400));
        assert_eq!(text.size, 0x200);
        assert!(map.overlay().is_none());
    }

    #[test]
    fn oversized_headers_swallow_sections_in_file_mode() {
        let mut bytes = TestImage::new(false)
            .section(".text", 0x1000, vec![0x90; 0x200])
            .build();
        let e_lfanew = u32::from_le_bytes(bytes[0x3C..0x40].try_into().unwrap()) as usize;
        let size_of_headers = e_lfanew + 4 + 20 + 60;
        bytes[size_of_headers..size_of_headers + 4].copy_from_slice(&0x00FF_0000u32.to_le_bytes());
        let file = File::from_mem(bytes).unwrap();
        let headers = PeHeaders::parse(&file, &ParseLimits::default()).unwrap();
        let map = MemoryMap::build(file.len() as u64, &headers, MapMode::File, None);

        // SizeOfHeaders is only clamped to the file, not to the first PointerToRawData
        let header = &map.regions[0];
        assert_eq!(header.kind, RegionKind::Header);
        assert_eq!(header.size, 0x600);
        assert!(!map
            .regions
            .iter()
            .any(|r| r.name == ".text" && r.file_offset.is_some()));
        assert_eq!(map.rel_address_to_offset(0x1000), None);
        assert!(map.overlay().is_none());
        assert_no_overlap(&map);
    }

    #[test]
    fn overlapping_sections_are_carved() {
        let image = TestImage::new(false)
            .section(".a", 0x1000, vec![0xAA; 0x400])
            .section(".b", 0x2000, vec![0xBB; 0x200])
            // .b reuses the raw bytes of .a
            .raw_override(Some(0x400), Some(0x200));
        let map = map_of(&image, MapMode::File);

        assert_no_overlap(&map);
        assert!(!map
            .regions
            .iter()
            .any(|r| r.name == ".b" && r.file_offset.is_some()));
        assert_eq!(map.rel_address_to_offset(0x1000), Some(0x400));
    }

    #[test]
    fn directory_rvas_resolve() {
        let image = TestImage::new(true)
            .section(".rdata", 0x3000, vec![0; 0x100])
            .directory(dir::IMPORT, 0x3000, 0x28);
        let map = map_of(&image, MapMode::File);

        assert_eq!(map.rel_address_to_offset(0x3000), Some(0x400));
        assert_eq!(map.entry_point_address, map.module_base_address);
        assert_eq!(map.image_size, 0x4000);
    }
}
