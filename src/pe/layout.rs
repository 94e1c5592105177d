//! Field layouts shared by the 32-bit and 64-bit variants of PE structures.
//!
//! Several PE structures exist twice, once per bitness, with identical field order but
//! pointer-sized fields widened to 8 bytes in PE32+. Instead of two struct definitions and two
//! readers, each structure is described once by a [`StructLayout`]: a table of fields with
//! their offset and width in both variants. [`LayoutRecord`] reads any layout from the byte
//! accessor and exposes fields by name; writers use [`StructLayout::field_location`] to patch
//! a single field in place.
//!
//! A width of zero marks a field that does not exist in that variant (`BaseOfData` in PE32+).

use crate::{file::File, file::io::write_le_sized, Result};

/// One field of a [`StructLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name as used by the Windows SDK headers
    pub name: &'static str,
    /// Offset in the 32-bit variant
    pub offset32: u16,
    /// Width in the 32-bit variant, 0 if absent
    pub width32: u8,
    /// Offset in the 64-bit variant
    pub offset64: u16,
    /// Width in the 64-bit variant, 0 if absent
    pub width64: u8,
}

impl FieldDef {
    /// Returns `(offset, width)` for the given bitness.
    #[must_use]
    pub fn location(&self, is_64: bool) -> (u64, u8) {
        if is_64 {
            (u64::from(self.offset64), self.width64)
        } else {
            (u64::from(self.offset32), self.width32)
        }
    }
}

/// Description of a structure whose pointer-sized fields depend on the image bitness.
#[derive(Debug)]
pub struct StructLayout {
    /// Structure name
    pub name: &'static str,
    /// Total size of the 32-bit variant
    pub size32: u16,
    /// Total size of the 64-bit variant
    pub size64: u16,
    /// Fields in declaration order
    pub fields: &'static [FieldDef],
}

impl StructLayout {
    /// Returns the structure size for the given bitness.
    #[must_use]
    pub fn size(&self, is_64: bool) -> u64 {
        if is_64 {
            u64::from(self.size64)
        } else {
            u64::from(self.size32)
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns `(offset, width)` of a field relative to the structure start, or `None` if the
    /// field is unknown or absent for this bitness.
    #[must_use]
    pub fn field_location(&self, name: &str, is_64: bool) -> Option<(u64, u8)> {
        let (offset, width) = self.field(name)?.location(is_64);
        (width != 0).then_some((offset, width))
    }

    /// Writes one field of a structure starting at `base` inside `buffer`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown field, or
    /// [`crate::Error::OutOfBounds`] if the buffer is too small.
    pub fn write_field(
        &self,
        buffer: &mut [u8],
        base: u64,
        name: &str,
        is_64: bool,
        value: u64,
    ) -> Result<()> {
        let Some((offset, width)) = self.field_location(name, is_64) else {
            return Err(malformed_error!("{} has no field {}", self.name, name));
        };
        let Ok(position) = usize::try_from(base + offset) else {
            return Err(out_of_bounds_error!());
        };
        write_le_sized(buffer, position, width, value)
    }
}

macro_rules! field {
    ($name:literal, $o32:literal, $w32:literal, $o64:literal, $w64:literal) => {
        FieldDef {
            name: $name,
            offset32: $o32,
            width32: $w32,
            offset64: $o64,
            width64: $w64,
        }
    };
}

/// `IMAGE_OPTIONAL_HEADER32` / `IMAGE_OPTIONAL_HEADER64`, without the data directory array.
pub static OPTIONAL_HEADER: StructLayout = StructLayout {
    name: "IMAGE_OPTIONAL_HEADER",
    size32: 96,
    size64: 112,
    fields: &[
        field!("Magic", 0, 2, 0, 2),
        field!("MajorLinkerVersion", 2, 1, 2, 1),
        field!("MinorLinkerVersion", 3, 1, 3, 1),
        field!("SizeOfCode", 4, 4, 4, 4),
        field!("SizeOfInitializedData", 8, 4, 8, 4),
        field!("SizeOfUninitializedData", 12, 4, 12, 4),
        field!("AddressOfEntryPoint", 16, 4, 16, 4),
        field!("BaseOfCode", 20, 4, 20, 4),
        field!("BaseOfData", 24, 4, 0, 0),
        field!("ImageBase", 28, 4, 24, 8),
        field!("SectionAlignment", 32, 4, 32, 4),
        field!("FileAlignment", 36, 4, 36, 4),
        field!("MajorOperatingSystemVersion", 40, 2, 40, 2),
        field!("MinorOperatingSystemVersion", 42, 2, 42, 2),
        field!("MajorImageVersion", 44, 2, 44, 2),
        field!("MinorImageVersion", 46, 2, 46, 2),
        field!("MajorSubsystemVersion", 48, 2, 48, 2),
        field!("MinorSubsystemVersion", 50, 2, 50, 2),
        field!("Win32VersionValue", 52, 4, 52, 4),
        field!("SizeOfImage", 56, 4, 56, 4),
        field!("SizeOfHeaders", 60, 4, 60, 4),
        field!("CheckSum", 64, 4, 64, 4),
        field!("Subsystem", 68, 2, 68, 2),
        field!("DllCharacteristics", 70, 2, 70, 2),
        field!("SizeOfStackReserve", 72, 4, 72, 8),
        field!("SizeOfStackCommit", 76, 4, 80, 8),
        field!("SizeOfHeapReserve", 80, 4, 88, 8),
        field!("SizeOfHeapCommit", 84, 4, 96, 8),
        field!("LoaderFlags", 88, 4, 104, 4),
        field!("NumberOfRvaAndSizes", 92, 4, 108, 4),
    ],
};

/// `IMAGE_TLS_DIRECTORY32` / `IMAGE_TLS_DIRECTORY64`.
pub static TLS_DIRECTORY: StructLayout = StructLayout {
    name: "IMAGE_TLS_DIRECTORY",
    size32: 24,
    size64: 40,
    fields: &[
        field!("StartAddressOfRawData", 0, 4, 0, 8),
        field!("EndAddressOfRawData", 4, 4, 8, 8),
        field!("AddressOfIndex", 8, 4, 16, 8),
        field!("AddressOfCallBacks", 12, 4, 24, 8),
        field!("SizeOfZeroFill", 16, 4, 32, 4),
        field!("Characteristics", 20, 4, 36, 4),
    ],
};

/// `IMAGE_LOAD_CONFIG_DIRECTORY32` / `IMAGE_LOAD_CONFIG_DIRECTORY64`.
///
/// `ProcessHeapFlags` and `ProcessAffinityMask` swap places between the two variants.
pub static LOAD_CONFIG_DIRECTORY: StructLayout = StructLayout {
    name: "IMAGE_LOAD_CONFIG_DIRECTORY",
    size32: 192,
    size64: 320,
    fields: &[
        field!("Size", 0, 4, 0, 4),
        field!("TimeDateStamp", 4, 4, 4, 4),
        field!("MajorVersion", 8, 2, 8, 2),
        field!("MinorVersion", 10, 2, 10, 2),
        field!("GlobalFlagsClear", 12, 4, 12, 4),
        field!("GlobalFlagsSet", 16, 4, 16, 4),
        field!("CriticalSectionDefaultTimeout", 20, 4, 20, 4),
        field!("DeCommitFreeBlockThreshold", 24, 4, 24, 8),
        field!("DeCommitTotalFreeThreshold", 28, 4, 32, 8),
        field!("LockPrefixTable", 32, 4, 40, 8),
        field!("MaximumAllocationSize", 36, 4, 48, 8),
        field!("VirtualMemoryThreshold", 40, 4, 56, 8),
        field!("ProcessHeapFlags", 44, 4, 72, 4),
        field!("ProcessAffinityMask", 48, 4, 64, 8),
        field!("CSDVersion", 52, 2, 76, 2),
        field!("DependentLoadFlags", 54, 2, 78, 2),
        field!("EditList", 56, 4, 80, 8),
        field!("SecurityCookie", 60, 4, 88, 8),
        field!("SEHandlerTable", 64, 4, 96, 8),
        field!("SEHandlerCount", 68, 4, 104, 8),
        field!("GuardCFCheckFunctionPointer", 72, 4, 112, 8),
        field!("GuardCFDispatchFunctionPointer", 76, 4, 120, 8),
        field!("GuardCFFunctionTable", 80, 4, 128, 8),
        field!("GuardCFFunctionCount", 84, 4, 136, 8),
        field!("GuardFlags", 88, 4, 144, 4),
        field!("CodeIntegrityFlags", 92, 2, 148, 2),
        field!("CodeIntegrityCatalog", 94, 2, 150, 2),
        field!("CodeIntegrityCatalogOffset", 96, 4, 152, 4),
        field!("CodeIntegrityReserved", 100, 4, 156, 4),
        field!("GuardAddressTakenIatEntryTable", 104, 4, 160, 8),
        field!("GuardAddressTakenIatEntryCount", 108, 4, 168, 8),
        field!("GuardLongJumpTargetTable", 112, 4, 176, 8),
        field!("GuardLongJumpTargetCount", 116, 4, 184, 8),
        field!("DynamicValueRelocTable", 120, 4, 192, 8),
        field!("CHPEMetadataPointer", 124, 4, 200, 8),
        field!("GuardRFFailureRoutine", 128, 4, 208, 8),
        field!("GuardRFFailureRoutineFunctionPointer", 132, 4, 216, 8),
        field!("DynamicValueRelocTableOffset", 136, 4, 224, 4),
        field!("DynamicValueRelocTableSection", 140, 2, 228, 2),
        field!("Reserved2", 142, 2, 230, 2),
        field!("GuardRFVerifyStackPointerFunctionPointer", 144, 4, 232, 8),
        field!("HotPatchTableOffset", 148, 4, 240, 4),
        field!("Reserved3", 152, 4, 244, 4),
        field!("EnclaveConfigurationPointer", 156, 4, 248, 8),
        field!("VolatileMetadataPointer", 160, 4, 256, 8),
        field!("GuardEHContinuationTable", 164, 4, 264, 8),
        field!("GuardEHContinuationCount", 168, 4, 272, 8),
        field!("GuardXFGCheckFunctionPointer", 172, 4, 280, 8),
        field!("GuardXFGDispatchFunctionPointer", 176, 4, 288, 8),
        field!("GuardXFGTableDispatchFunctionPointer", 180, 4, 296, 8),
        field!("CastGuardOsDeterminedFailureMode", 184, 4, 304, 8),
        field!("GuardMemcpyFunctionPointer", 188, 4, 312, 8),
    ],
};

/// A structure read through a [`StructLayout`].
///
/// Values are held in declaration order. Fields that could not be read, because they lie past
/// the end of the file or past the caller-provided `available` byte count, read as zero.
#[derive(Debug, Clone)]
pub struct LayoutRecord {
    layout: &'static StructLayout,
    is_64: bool,
    offset: u64,
    values: Vec<Option<u64>>,
}

impl LayoutRecord {
    /// Reads `layout` at file offset `offset`.
    ///
    /// `available` limits how many bytes of the structure are considered present; fields ending
    /// beyond it read as zero. Pass `None` for the full structure size.
    #[must_use]
    pub fn read(
        file: &File,
        offset: u64,
        layout: &'static StructLayout,
        is_64: bool,
        available: Option<u64>,
    ) -> LayoutRecord {
        let available = available.unwrap_or_else(|| layout.size(is_64));

        let values = layout
            .fields
            .iter()
            .map(|field| {
                let (field_offset, width) = field.location(is_64);
                if width == 0 || field_offset + u64::from(width) > available {
                    return None;
                }

                let position = offset.checked_add(field_offset)?;
                let value = match width {
                    1 => file.read_u8(position).map(u64::from),
                    2 => file.read_u16(position, false).map(u64::from),
                    4 => file.read_u32(position, false).map(u64::from),
                    _ => file.read_u64(position, false),
                };
                value.ok()
            })
            .collect();

        LayoutRecord {
            layout,
            is_64,
            offset,
            values,
        }
    }

    /// Returns the value of a field, or 0 when the field is absent, unknown or unreadable.
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.try_get(name).unwrap_or(0)
    }

    /// Returns the value of a field if it was actually read.
    #[must_use]
    pub fn try_get(&self, name: &str) -> Option<u64> {
        let index = self.layout.fields.iter().position(|f| f.name == name)?;
        self.values.get(index).copied().flatten()
    }

    /// Returns a field truncated to 32 bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_u32(&self, name: &str) -> u32 {
        self.get(name) as u32
    }

    /// Returns a field truncated to 16 bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_u16(&self, name: &str) -> u16 {
        self.get(name) as u16
    }

    /// File offset the record was read from.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the 64-bit variant was read.
    #[must_use]
    pub fn is_64(&self) -> bool {
        self.is_64
    }

    /// The layout the record was read with.
    #[must_use]
    pub fn layout(&self) -> &'static StructLayout {
        self.layout
    }

    /// Absolute file offset of a field, if it exists for this bitness.
    #[must_use]
    pub fn field_offset(&self, name: &str) -> Option<u64> {
        self.layout
            .field_location(name, self.is_64)
            .map(|(offset, _)| self.offset + offset)
    }

    /// Iterates `(name, value)` over every field that was read.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.layout
            .fields
            .iter()
            .zip(self.values.iter())
            .filter_map(|(field, value)| value.map(|v| (field.name, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_consistent() {
        for layout in [&OPTIONAL_HEADER, &TLS_DIRECTORY, &LOAD_CONFIG_DIRECTORY] {
            for field in layout.fields {
                if field.width32 != 0 {
                    assert!(
                        field.offset32 + u16::from(field.width32) <= layout.size32,
                        "{}::{} exceeds the 32-bit size",
                        layout.name,
                        field.name
                    );
                }
                if field.width64 != 0 {
                    assert!(
                        field.offset64 + u16::from(field.width64) <= layout.size64,
                        "{}::{} exceeds the 64-bit size",
                        layout.name,
                        field.name
                    );
                }
            }
        }
    }

    #[test]
    fn optional_header_offsets() {
        assert_eq!(OPTIONAL_HEADER.field_location("ImageBase", false), Some((28, 4)));
        assert_eq!(OPTIONAL_HEADER.field_location("ImageBase", true), Some((24, 8)));
        assert_eq!(OPTIONAL_HEADER.field_location("CheckSum", true), Some((64, 4)));
        assert_eq!(OPTIONAL_HEADER.field_location("BaseOfData", true), None);
        assert_eq!(
            OPTIONAL_HEADER.field_location("NumberOfRvaAndSizes", true),
            Some((108, 4))
        );
        assert_eq!(OPTIONAL_HEADER.size(false), 96);
        assert_eq!(OPTIONAL_HEADER.size(true), 112);
    }

    #[test]
    fn read_tls_64() {
        let mut data = vec![0u8; 48];
        data[8..16].copy_from_slice(&0x1_4000_1000_u64.to_le_bytes());
        data[24..32].copy_from_slice(&0x1_4000_2000_u64.to_le_bytes());
        data[44..48].copy_from_slice(&0x0010_0000_u32.to_le_bytes());
        let file = File::from_mem(data).unwrap();

        let record = LayoutRecord::read(&file, 8, &TLS_DIRECTORY, true, None);
        assert_eq!(record.get("StartAddressOfRawData"), 0x1_4000_1000);
        assert_eq!(record.get("AddressOfIndex"), 0x1_4000_2000);
        assert_eq!(record.get("Characteristics"), 0x0010_0000);
        assert_eq!(record.get("NoSuchField"), 0);
        assert_eq!(record.field_offset("AddressOfCallBacks"), Some(32));
    }

    #[test]
    fn available_limits_fields() {
        let mut data = vec![0xFFu8; 0x40];
        data[0..4].copy_from_slice(&12_u32.to_le_bytes());
        let file = File::from_mem(data).unwrap();

        let record = LayoutRecord::read(&file, 0, &LOAD_CONFIG_DIRECTORY, false, Some(12));
        assert_eq!(record.get("Size"), 12);
        assert_eq!(record.get("MinorVersion"), 0xFFFF);
        assert_eq!(record.get("GlobalFlagsClear"), 0);
        assert_eq!(record.try_get("SecurityCookie"), None);
    }

    #[test]
    fn truncated_file_reads_zero() {
        let file = File::from_mem(vec![0x11; 10]).unwrap();
        let record = LayoutRecord::read(&file, 0, &TLS_DIRECTORY, false, None);

        assert_eq!(record.get("StartAddressOfRawData"), 0x1111_1111);
        assert_eq!(record.get("AddressOfIndex"), 0);
    }

    #[test]
    fn write_field() {
        let mut buffer = vec![0u8; 120];
        OPTIONAL_HEADER
            .write_field(&mut buffer, 4, "CheckSum", false, 0xAABB_CCDD)
            .unwrap();
        assert_eq!(&buffer[68..72], &[0xDD, 0xCC, 0xBB, 0xAA]);

        assert!(OPTIONAL_HEADER
            .write_field(&mut buffer, 0, "BaseOfData", true, 1)
            .is_err());
        assert!(OPTIONAL_HEADER
            .write_field(&mut buffer, 100, "CheckSum", false, 1)
            .is_err());
    }
}
