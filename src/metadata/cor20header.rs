//! CLI (COR20) header.
//!
//! The ComDescriptor data directory points at this 72-byte header. It locates the metadata
//! root and five more runtime directories.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use bitflags::bitflags;

use crate::{
    file::parser::Parser,
    pe::{constants::COR20_HEADER_SIZE, DataDirectory},
    Error::OutOfBounds,
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// `COMIMAGE_FLAGS_*`
    pub struct ComImageFlags: u32 {
        /// Contains only IL code
        const IL_ONLY = 0x0000_0001;
        /// Requires a 32-bit process
        const REQUIRED_32BIT = 0x0000_0002;
        /// Contains IL library code only
        const IL_LIBRARY = 0x0000_0004;
        /// Strong name signed
        const STRONG_NAME_SIGNED = 0x0000_0008;
        /// Entry point is an RVA to native code
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        /// Debug information is tracked
        const TRACK_DEBUG_DATA = 0x0001_0000;
        /// Prefers a 32-bit process
        const PREFER_32BIT = 0x0002_0000;

        const _ = !0;
    }
}

/// `IMAGE_COR20_HEADER`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cor20Header {
    /// Size of the header, 72
    pub cb: u32,
    /// Minimum runtime major version
    pub major_runtime_version: u16,
    /// Minimum runtime minor version
    pub minor_runtime_version: u16,
    /// Metadata root
    pub metadata: DataDirectory,
    /// Runtime flags
    pub flags: ComImageFlags,
    /// `MethodDef` or `File` token, an RVA with [`ComImageFlags::NATIVE_ENTRYPOINT`]
    pub entry_point_token: u32,
    /// Managed resources
    pub resources: DataDirectory,
    /// Strong name signature hash
    pub strong_name_signature: DataDirectory,
    /// Reserved, zero
    pub code_manager_table: DataDirectory,
    /// VTable fixups for unmanaged callers
    pub vtable_fixups: DataDirectory,
    /// Reserved, zero
    pub export_address_table_jumps: DataDirectory,
    /// Precompiled image header, zero in IL images
    pub managed_native_header: DataDirectory,
}

impl Cor20Header {
    /// Decodes the header.
    ///
    /// Only the size is validated; flags and reserved directories are taken as stored.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for fewer than 72 bytes and
    /// [`crate::Error::Malformed`] if `cb` is below 72.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if (data.len() as u64) < COR20_HEADER_SIZE {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);
        let cb = parser.read_le::<u32>()?;
        if u64::from(cb) < COR20_HEADER_SIZE {
            return Err(malformed_error!("CLI header size {} is below 72", cb));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;
        let metadata = Self::directory(&mut parser)?;
        let flags = ComImageFlags::from_bits_retain(parser.read_le::<u32>()?);
        let entry_point_token = parser.read_le::<u32>()?;

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            metadata,
            flags,
            entry_point_token,
            resources: Self::directory(&mut parser)?,
            strong_name_signature: Self::directory(&mut parser)?,
            code_manager_table: Self::directory(&mut parser)?,
            vtable_fixups: Self::directory(&mut parser)?,
            export_address_table_jumps: Self::directory(&mut parser)?,
            managed_native_header: Self::directory(&mut parser)?,
        })
    }

    fn directory(parser: &mut Parser) -> Result<DataDirectory> {
        Ok(DataDirectory {
            virtual_address: parser.read_le::<u32>()?,
            size: parser.read_le::<u32>()?,
        })
    }

    /// Runtime version as `major.minor`.
    #[must_use]
    pub fn runtime_version(&self) -> String {
        format!(
            "{}.{}",
            self.major_runtime_version, self.minor_runtime_version
        )
    }
}
