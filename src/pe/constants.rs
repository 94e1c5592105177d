//! On-disk constants of the PE/COFF format.

/// DOS header magic (`MZ`)
pub const DOS_MAGIC: u16 = 0x5A4D;
/// NT header signature (`PE\0\0`)
pub const PE_SIGNATURE: u32 = 0x0000_4550;
/// Offset of `e_lfanew` inside the DOS header
pub const E_LFANEW_OFFSET: u64 = 0x3C;
/// Size of the DOS header
pub const DOS_HEADER_SIZE: u64 = 0x40;

/// Optional header magic of PE32 images
pub const PE32_MAGIC: u16 = 0x10B;
/// Optional header magic of PE32+ images
pub const PE32PLUS_MAGIC: u16 = 0x20B;
/// Optional header magic of ROM images
pub const ROM_MAGIC: u16 = 0x107;

/// Size of the COFF file header
pub const FILE_HEADER_SIZE: u64 = 20;
/// Size of one section header
pub const SECTION_HEADER_SIZE: u64 = 40;
/// Size of one data directory entry
pub const DATA_DIRECTORY_SIZE: u64 = 8;
/// Number of well-known data directory slots
pub const DATA_DIRECTORY_COUNT: usize = 16;

/// File alignment substituted for a corrupted (zero or > 64K) value
pub const DEFAULT_FILE_ALIGNMENT: u32 = 0x200;
/// Section alignment substituted for a corrupted (zero or > 64K) value
pub const DEFAULT_SECTION_ALIGNMENT: u32 = 0x1000;
/// Largest alignment value accepted from the headers
pub const MAX_ALIGNMENT: u32 = 0x10000;

/// Size of one relocation page
pub const RELOC_PAGE_SIZE: u32 = 0x1000;
/// `IMAGE_REL_BASED_ABSOLUTE`, used as padding
pub const IMAGE_REL_BASED_ABSOLUTE: u8 = 0x0;
/// `IMAGE_REL_BASED_HIGHLOW`, 32-bit fix-up
pub const IMAGE_REL_BASED_HIGHLOW: u8 = 0x3;
/// `IMAGE_REL_BASED_DIR64`, 64-bit fix-up
pub const IMAGE_REL_BASED_DIR64: u8 = 0xA;

/// Size of `IMAGE_IMPORT_DESCRIPTOR`
pub const IMPORT_DESCRIPTOR_SIZE: u64 = 20;
/// Size of `IMAGE_EXPORT_DIRECTORY`
pub const EXPORT_DIRECTORY_SIZE: u64 = 40;
/// Size of `IMAGE_RESOURCE_DIRECTORY`
pub const RESOURCE_DIRECTORY_SIZE: u64 = 16;
/// Size of `IMAGE_RESOURCE_DIRECTORY_ENTRY`
pub const RESOURCE_ENTRY_SIZE: u64 = 8;
/// Size of `IMAGE_RESOURCE_DATA_ENTRY`
pub const RESOURCE_DATA_ENTRY_SIZE: u64 = 16;
/// Size of `IMAGE_DEBUG_DIRECTORY`
pub const DEBUG_DIRECTORY_SIZE: u64 = 28;
/// Size of `ImgDelayDescr`
pub const DELAY_DESCRIPTOR_SIZE: u64 = 32;
/// Size of `IMAGE_BOUND_IMPORT_DESCRIPTOR` and `IMAGE_BOUND_FORWARDER_REF`
pub const BOUND_DESCRIPTOR_SIZE: u64 = 8;
/// Size of `IMAGE_COR20_HEADER`
pub const COR20_HEADER_SIZE: u64 = 72;

/// Top bit of a 32-bit thunk: import by ordinal
pub const ORDINAL_FLAG32: u64 = 0x8000_0000;
/// Top bit of a 64-bit thunk: import by ordinal
pub const ORDINAL_FLAG64: u64 = 0x8000_0000_0000_0000;

/// Resource entry flag: `Name` is an offset to a length-prefixed UTF-16 string
pub const RESOURCE_NAME_IS_STRING: u32 = 0x8000_0000;
/// Resource entry flag: `OffsetToData` points to a subdirectory
pub const RESOURCE_DATA_IS_DIRECTORY: u32 = 0x8000_0000;

/// Resource type id of version information
pub const RT_VERSION: u32 = 16;
/// Resource type id of manifests
pub const RT_MANIFEST: u32 = 24;

/// `VS_FIXEDFILEINFO.dwSignature`
pub const VS_FFI_SIGNATURE: u32 = 0xFEEF_04BD;

/// `IMAGE_DEBUG_TYPE_CODEVIEW`
pub const IMAGE_DEBUG_TYPE_CODEVIEW: u32 = 2;
/// CodeView 7.0 signature (`RSDS`)
pub const CV_SIGNATURE_RSDS: u32 = 0x5344_5352;
/// CodeView 2.0 signature (`NB10`)
pub const CV_SIGNATURE_NB10: u32 = 0x3031_424E;

/// `WIN_CERT_TYPE_PKCS_SIGNED_DATA`
pub const WIN_CERT_TYPE_PKCS_SIGNED_DATA: u16 = 0x0002;
/// `WIN_CERT_TYPE_X509`
pub const WIN_CERT_TYPE_X509: u16 = 0x0001;
/// `WIN_CERT_TYPE_TS_STACK_SIGNED`
pub const WIN_CERT_TYPE_TS_STACK_SIGNED: u16 = 0x0004;
/// `WIN_CERT_REVISION_1_0`
pub const WIN_CERT_REVISION_1_0: u16 = 0x0100;
/// `WIN_CERT_REVISION_2_0`
pub const WIN_CERT_REVISION_2_0: u16 = 0x0200;
/// Size of the `WIN_CERTIFICATE` header
pub const WIN_CERTIFICATE_HEADER_SIZE: u64 = 8;

/// Metadata root signature (`BSJB`)
pub const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// Longest library or function name read from import and export tables
pub const MAX_NAME_LEN: usize = 0x400;
