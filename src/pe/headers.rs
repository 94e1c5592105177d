//! DOS, COFF, optional and section headers.
//!
//! All headers are decoded field by field through the byte accessor. The parse is tolerant:
//! anything beyond the structural minimum (an `MZ` magic, an in-range `e_lfanew`, the
//! `PE\0\0` signature and a complete optional header) is clamped or defaulted instead of
//! rejected. Besides the decoded values, [`PeHeaders`] records the file offsets of the fields
//! the mutation engine patches (checksum, data directories, section table).

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::{
    config::ParseLimits,
    file::File,
    pe::{
        constants::{
            DATA_DIRECTORY_COUNT, DATA_DIRECTORY_SIZE, DOS_MAGIC, E_LFANEW_OFFSET,
            FILE_HEADER_SIZE, PE32PLUS_MAGIC, PE_SIGNATURE, SECTION_HEADER_SIZE,
        },
        layout::{LayoutRecord, OPTIONAL_HEADER},
    },
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// `IMAGE_SECTION_HEADER.Characteristics`
    pub struct SectionFlags: u32 {
        /// Section should not be padded to the next boundary
        const TYPE_NO_PAD = 0x0000_0008;
        /// Section contains executable code
        const CNT_CODE = 0x0000_0020;
        /// Section contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// Section contains uninitialized data
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// Section contains comments or other information
        const LNK_INFO = 0x0000_0200;
        /// Section will not become part of the image
        const LNK_REMOVE = 0x0000_0800;
        /// Section contains COMDAT data
        const LNK_COMDAT = 0x0000_1000;
        /// Section contains data referenced through the global pointer
        const GPREL = 0x0000_8000;
        /// Section contains extended relocations
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// Section can be discarded as needed
        const MEM_DISCARDABLE = 0x0200_0000;
        /// Section cannot be cached
        const MEM_NOT_CACHED = 0x0400_0000;
        /// Section is not pageable
        const MEM_NOT_PAGED = 0x0800_0000;
        /// Section can be shared in memory
        const MEM_SHARED = 0x1000_0000;
        /// Section can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// Section can be read
        const MEM_READ = 0x4000_0000;
        /// Section can be written to
        const MEM_WRITE = 0x8000_0000;

        // alignment nibble and unknown bits survive a read/write cycle
        const _ = !0;
    }
}

impl SectionFlags {
    /// Returns a compact `RWX` string.
    #[must_use]
    pub fn rwx(&self) -> String {
        let mut flags = String::with_capacity(3);
        flags.push(if self.contains(Self::MEM_READ) { 'R' } else { '-' });
        flags.push(if self.contains(Self::MEM_WRITE) { 'W' } else { '-' });
        flags.push(if self.contains(Self::MEM_EXECUTE) { 'X' } else { '-' });
        flags
    }
}

/// The 16 well-known data directory slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, Display, FromRepr)]
#[repr(usize)]
pub enum DataDirectoryType {
    /// Export table
    Export = 0,
    /// Import table
    Import = 1,
    /// Resource table
    Resource = 2,
    /// Exception table
    Exception = 3,
    /// Attribute certificate table; its address is a file offset
    Security = 4,
    /// Base relocation table
    BaseReloc = 5,
    /// Debug directory
    Debug = 6,
    /// Reserved, must be zero
    Architecture = 7,
    /// Global pointer register value
    GlobalPtr = 8,
    /// Thread local storage table
    Tls = 9,
    /// Load configuration table
    LoadConfig = 10,
    /// Bound import table
    BoundImport = 11,
    /// Import address table
    Iat = 12,
    /// Delay import descriptors
    DelayImport = 13,
    /// CLR runtime header
    ComDescriptor = 14,
    /// Reserved, must be zero
    Reserved = 15,
}

/// `IMAGE_DATA_DIRECTORY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    /// RVA of the table (a file offset for [`DataDirectoryType::Security`])
    pub virtual_address: u32,
    /// Size in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Returns `true` if the directory is absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.virtual_address == 0 || self.size == 0
    }
}

/// The fields of `IMAGE_DOS_HEADER` the parser uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    /// `MZ`
    pub e_magic: u16,
    /// File offset of the NT headers
    pub e_lfanew: u32,
}

/// `IMAGE_FILE_HEADER`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Target machine
    pub machine: u16,
    /// Number of section headers as stored
    pub number_of_sections: u16,
    /// Link time stamp
    pub time_date_stamp: u32,
    /// COFF symbol table file offset
    pub pointer_to_symbol_table: u32,
    /// COFF symbol count
    pub number_of_symbols: u32,
    /// Size of the optional header, locates the section table
    pub size_of_optional_header: u16,
    /// `IMAGE_FILE_*` flags
    pub characteristics: u16,
}

impl FileHeader {
    /// Returns `true` if `IMAGE_FILE_DLL` is set.
    #[must_use]
    pub fn is_dll(&self) -> bool {
        self.characteristics & 0x2000 != 0
    }
}

/// `IMAGE_OPTIONAL_HEADER32` / `IMAGE_OPTIONAL_HEADER64`
///
/// The commonly used fields are decoded eagerly; everything else is reachable by name
/// through [`OptionalHeader::record`].
#[derive(Debug, Clone)]
pub struct OptionalHeader {
    /// `0x10B` or `0x20B`
    pub magic: u16,
    /// PE32+ image
    pub is_64: bool,
    /// Entry point RVA
    pub address_of_entry_point: u32,
    /// Preferred load address
    pub image_base: u64,
    /// Section alignment as stored (not clamped)
    pub section_alignment: u32,
    /// File alignment as stored (not clamped)
    pub file_alignment: u32,
    /// Size of the loaded image
    pub size_of_image: u32,
    /// Size of all headers rounded to the file alignment
    pub size_of_headers: u32,
    /// Stored checksum
    pub checksum: u32,
    /// Windows subsystem
    pub subsystem: u16,
    /// `IMAGE_DLLCHARACTERISTICS_*` flags
    pub dll_characteristics: u16,
    /// Number of data directory entries as stored
    pub number_of_rva_and_sizes: u32,
    record: LayoutRecord,
}

impl OptionalHeader {
    /// All fields by name.
    #[must_use]
    pub fn record(&self) -> &LayoutRecord {
        &self.record
    }
}

/// `IMAGE_SECTION_HEADER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionHeader {
    /// Raw 8-byte name
    pub name: [u8; 8],
    /// Size in memory
    pub virtual_size: u32,
    /// RVA of the first byte
    pub virtual_address: u32,
    /// Size on disk
    pub size_of_raw_data: u32,
    /// File offset of the raw data
    pub pointer_to_raw_data: u32,
    /// File offset of COFF relocations
    pub pointer_to_relocations: u32,
    /// File offset of COFF line numbers
    pub pointer_to_linenumbers: u32,
    /// COFF relocation count
    pub number_of_relocations: u16,
    /// COFF line number count
    pub number_of_linenumbers: u16,
    /// Section flags
    pub characteristics: SectionFlags,
}

impl SectionHeader {
    /// Decodes a section header from its 40 on-disk bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 40 bytes are provided.
    pub fn parse(data: &[u8]) -> Result<SectionHeader> {
        if data.len() < 40 {
            return Err(out_of_bounds_error!());
        }

        let u32_at = |o: usize| u32::from_le_bytes([data[o], data[o + 1], data[o + 2], data[o + 3]]);
        let u16_at = |o: usize| u16::from_le_bytes([data[o], data[o + 1]]);

        let mut name = [0u8; 8];
        name.copy_from_slice(&data[0..8]);

        Ok(SectionHeader {
            name,
            virtual_size: u32_at(8),
            virtual_address: u32_at(12),
            size_of_raw_data: u32_at(16),
            pointer_to_raw_data: u32_at(20),
            pointer_to_relocations: u32_at(24),
            pointer_to_linenumbers: u32_at(28),
            number_of_relocations: u16_at(32),
            number_of_linenumbers: u16_at(34),
            characteristics: SectionFlags::from_bits_retain(u32_at(36)),
        })
    }

    /// Encodes the header into its 40 on-disk bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 40] {
        let mut out = [0u8; 40];
        out[0..8].copy_from_slice(&self.name);
        out[8..12].copy_from_slice(&self.virtual_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.virtual_address.to_le_bytes());
        out[16..20].copy_from_slice(&self.size_of_raw_data.to_le_bytes());
        out[20..24].copy_from_slice(&self.pointer_to_raw_data.to_le_bytes());
        out[24..28].copy_from_slice(&self.pointer_to_relocations.to_le_bytes());
        out[28..32].copy_from_slice(&self.pointer_to_linenumbers.to_le_bytes());
        out[32..34].copy_from_slice(&self.number_of_relocations.to_le_bytes());
        out[34..36].copy_from_slice(&self.number_of_linenumbers.to_le_bytes());
        out[36..40].copy_from_slice(&self.characteristics.bits().to_le_bytes());
        out
    }

    /// Builds a header with the name truncated or NUL-padded to 8 bytes.
    #[must_use]
    pub fn with_name(name: &str) -> SectionHeader {
        let mut raw = [0u8; 8];
        for (dst, src) in raw.iter_mut().zip(name.bytes()) {
            *dst = src;
        }

        SectionHeader {
            name: raw,
            ..SectionHeader::default()
        }
    }

    /// Returns the name up to the first NUL, lossily decoded.
    #[must_use]
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Returns `true` if `rva` lies within the section's virtual span.
    ///
    /// A zero `VirtualSize` falls back to the raw size, as the loader does.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        let size = if self.virtual_size == 0 {
            self.size_of_raw_data
        } else {
            self.virtual_size
        };
        rva >= self.virtual_address && u64::from(rva) < u64::from(self.virtual_address) + u64::from(size)
    }
}

/// File offsets of header fields that mutations patch in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderOffsets {
    /// `e_lfanew`, the NT signature
    pub nt_headers: u64,
    /// `IMAGE_FILE_HEADER`
    pub file_header: u64,
    /// `IMAGE_OPTIONAL_HEADER`
    pub optional_header: u64,
    /// `OptionalHeader.CheckSum`
    pub checksum: u64,
    /// First `IMAGE_DATA_DIRECTORY`
    pub data_directories: u64,
    /// First `IMAGE_SECTION_HEADER`
    pub section_table: u64,
}

/// All headers of a structurally valid PE image.
#[derive(Debug, Clone)]
pub struct PeHeaders {
    /// DOS header
    pub dos: DosHeader,
    /// COFF file header
    pub file: FileHeader,
    /// Optional header
    pub optional: OptionalHeader,
    /// Always 16 entries; slots beyond `NumberOfRvaAndSizes` or past EOF are zero
    pub data_directories: [DataDirectory; DATA_DIRECTORY_COUNT],
    /// Section headers, capped by [`ParseLimits::max_sections`] and stopping at EOF
    pub sections: Vec<SectionHeader>,
    /// Offsets of patchable fields
    pub offsets: HeaderOffsets,
}

impl PeHeaders {
    /// Parses the headers, returning `None` if the image is structurally invalid.
    #[must_use]
    pub fn parse(file: &File, limits: &ParseLimits) -> Option<PeHeaders> {
        let e_magic = file.read_u16(0, false).ok()?;
        if e_magic != DOS_MAGIC {
            log::debug!("missing MZ signature");
            return None;
        }

        let e_lfanew = file.read_u32(E_LFANEW_OFFSET, false).ok()?;
        let nt_headers = u64::from(e_lfanew);
        if nt_headers + 4 + FILE_HEADER_SIZE > file.len() as u64 {
            log::debug!("e_lfanew 0x{e_lfanew:x} out of range");
            return None;
        }

        if file.read_u32(nt_headers, false).ok()? != PE_SIGNATURE {
            log::debug!("missing PE signature at 0x{e_lfanew:x}");
            return None;
        }

        let file_header_offset = nt_headers + 4;
        let fh = Self::parse_file_header(file, file_header_offset).ok()?;

        let optional_header = file_header_offset + FILE_HEADER_SIZE;
        let magic = file.read_u16(optional_header, false).ok()?;
        let is_64 = magic == PE32PLUS_MAGIC;

        let base_size = OPTIONAL_HEADER.size(is_64);
        if optional_header + base_size > file.len() as u64 {
            log::debug!("optional header truncated");
            return None;
        }

        let record = LayoutRecord::read(file, optional_header, &OPTIONAL_HEADER, is_64, None);
        let optional = OptionalHeader {
            magic,
            is_64,
            address_of_entry_point: record.get_u32("AddressOfEntryPoint"),
            image_base: record.get("ImageBase"),
            section_alignment: record.get_u32("SectionAlignment"),
            file_alignment: record.get_u32("FileAlignment"),
            size_of_image: record.get_u32("SizeOfImage"),
            size_of_headers: record.get_u32("SizeOfHeaders"),
            checksum: record.get_u32("CheckSum"),
            subsystem: record.get_u16("Subsystem"),
            dll_characteristics: record.get_u16("DllCharacteristics"),
            number_of_rva_and_sizes: record.get_u32("NumberOfRvaAndSizes"),
            record,
        };

        let data_directories_offset = optional_header + base_size;
        let mut data_directories = [DataDirectory::default(); DATA_DIRECTORY_COUNT];
        let count = (optional.number_of_rva_and_sizes as usize).min(DATA_DIRECTORY_COUNT);
        for (index, slot) in data_directories.iter_mut().enumerate().take(count) {
            let at = data_directories_offset + index as u64 * DATA_DIRECTORY_SIZE;
            let (Ok(virtual_address), Ok(size)) =
                (file.read_u32(at, false), file.read_u32(at + 4, false))
            else {
                break;
            };
            *slot = DataDirectory {
                virtual_address,
                size,
            };
        }

        let section_table = optional_header + u64::from(fh.size_of_optional_header);
        let declared = usize::from(fh.number_of_sections);
        if declared > limits.max_sections {
            log::debug!(
                "section count {declared} capped to {}",
                limits.max_sections
            );
        }

        let mut sections = Vec::with_capacity(declared.min(limits.max_sections));
        for index in 0..declared.min(limits.max_sections) {
            let at = section_table + index as u64 * SECTION_HEADER_SIZE;
            let Ok(bytes) = file.read_array(at, SECTION_HEADER_SIZE as usize) else {
                log::debug!("section table truncated after {index} entries");
                break;
            };
            let Ok(section) = SectionHeader::parse(bytes) else {
                break;
            };
            sections.push(section);
        }

        Some(PeHeaders {
            dos: DosHeader { e_magic, e_lfanew },
            file: fh,
            offsets: HeaderOffsets {
                nt_headers,
                file_header: file_header_offset,
                optional_header,
                checksum: optional_header + 64,
                data_directories: data_directories_offset,
                section_table,
            },
            optional,
            data_directories,
            sections,
        })
    }

    fn parse_file_header(file: &File, offset: u64) -> Result<FileHeader> {
        Ok(FileHeader {
            machine: file.read_u16(offset, false)?,
            number_of_sections: file.read_u16(offset + 2, false)?,
            time_date_stamp: file.read_u32(offset + 4, false)?,
            pointer_to_symbol_table: file.read_u32(offset + 8, false)?,
            number_of_symbols: file.read_u32(offset + 12, false)?,
            size_of_optional_header: file.read_u16(offset + 16, false)?,
            characteristics: file.read_u16(offset + 18, false)?,
        })
    }

    /// Returns the data directory of the given slot.
    #[must_use]
    pub fn directory(&self, kind: DataDirectoryType) -> DataDirectory {
        self.data_directories[kind as usize]
    }

    /// File offset of a data directory entry.
    #[must_use]
    pub fn directory_entry_offset(&self, kind: DataDirectoryType) -> u64 {
        self.offsets.data_directories + kind as u64 * DATA_DIRECTORY_SIZE
    }

    /// File offset of a section header.
    #[must_use]
    pub fn section_header_offset(&self, index: usize) -> u64 {
        self.offsets.section_table + index as u64 * SECTION_HEADER_SIZE
    }

    /// End of the section table in the file.
    #[must_use]
    pub fn section_table_end(&self) -> u64 {
        self.section_header_offset(self.sections.len())
    }

    /// Returns the section containing `rva`, if any.
    #[must_use]
    pub fn section_by_rva(&self, rva: u32) -> Option<(usize, &SectionHeader)> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, section)| section.contains_rva(rva))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestImage;
    use strum::IntoEnumIterator;

    #[test]
    fn section_roundtrip() {
        let mut header = SectionHeader::with_name(".reloc_long_name");
        header.virtual_size = 0x123;
        header.virtual_address = 0x5000;
        header.characteristics = SectionFlags::MEM_READ | SectionFlags::CNT_INITIALIZED_DATA;

        let bytes = header.to_bytes();
        let parsed = SectionHeader::parse(&bytes).unwrap();

        assert_eq!(parsed, header);
        assert_eq!(parsed.name_str(), ".reloc_l");
        assert_eq!(parsed.characteristics.rwx(), "R--");
        assert!(SectionHeader::parse(&bytes[..39]).is_err());
    }

    #[test]
    fn unknown_flag_bits_survive() {
        let flags = SectionFlags::from_bits_retain(0x6050_0020);
        assert_eq!(flags.bits(), 0x6050_0020);
        assert_eq!(flags.rwx(), "R-X");
    }

    #[test]
    fn directory_types() {
        assert_eq!(DataDirectoryType::iter().count(), 16);
        assert_eq!(DataDirectoryType::from_repr(14), Some(DataDirectoryType::ComDescriptor));
        assert_eq!(DataDirectoryType::Security.to_string(), "Security");
    }

    #[test]
    fn parse_synthetic() {
        let image = TestImage::new(true)
            .section(".text", 0x1000, vec![0xC3; 0x10])
            .section(".data", 0x2000, vec![0x00; 0x300])
            .build();
        let file = File::from_mem(image).unwrap();
        let headers = PeHeaders::parse(&file, &ParseLimits::default()).unwrap();

        assert!(headers.optional.is_64);
        assert_eq!(headers.dos.e_lfanew, 0x80);
        assert_eq!(headers.sections.len(), 2);
        assert_eq!(headers.sections[1].name_str(), ".data");
        assert_eq!(headers.offsets.checksum, 0x80 + 4 + 20 + 64);
        assert_eq!(headers.offsets.section_table, 0x80 + 4 + 20 + 240);
        assert_eq!(headers.section_by_rva(0x2010).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn parse_rejects_garbage() {
        let limits = ParseLimits::default();

        let file = File::from_mem(vec![0u8; 0x200]).unwrap();
        assert!(PeHeaders::parse(&file, &limits).is_none());

        let mut data = vec![0u8; 0x100];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x3C..0x40].copy_from_slice(&0xFFFF_FF00_u32.to_le_bytes());
        let file = File::from_mem(data.clone()).unwrap();
        assert!(PeHeaders::parse(&file, &limits).is_none());

        data[0x3C..0x40].copy_from_slice(&0x40_u32.to_le_bytes());
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        // optional header truncated by the end of the buffer
        let file = File::from_mem(data[..0x80].to_vec()).unwrap();
        assert!(PeHeaders::parse(&file, &limits).is_none());
    }

    #[test]
    fn section_cap() {
        let mut builder = TestImage::new(false);
        for index in 0..8 {
            builder = builder.section(&format!(".s{index}"), 0x1000 * (index + 1), vec![1; 0x10]);
        }
        let file = File::from_mem(builder.build()).unwrap();

        let limits = ParseLimits {
            max_sections: 3,
            ..ParseLimits::default()
        };
        let headers = PeHeaders::parse(&file, &limits).unwrap();
        assert_eq!(headers.file.number_of_sections, 8);
        assert_eq!(headers.sections.len(), 3);
    }
}
