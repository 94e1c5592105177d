//! `VS_VERSIONINFO` decoding.
//!
//! The version resource is a tree of blocks sharing one header:
//!
//! ```text
//! +0  wLength       block size including children
//! +2  wValueLength  value size, in bytes for binary values, in UTF-16 units for text
//! +4  wType         0 binary, 1 text
//! +6  szKey         NUL-terminated UTF-16, then padding to a 4-byte boundary
//!     Value         then padding to a 4-byte boundary
//!     Children
//! ```
//!
//! The root value is a `VS_FIXEDFILEINFO`. Children named `StringFileInfo` hold one string
//! table per language, `VarFileInfo` holds the `Translation` language/code page pairs.

use std::fmt;

use crate::{
    file::parser::Parser,
    pe::{
        constants::{RT_VERSION, VS_FFI_SIGNATURE},
        resources::ResourceName,
        PeFile,
    },
    Result,
};

const FIXED_FILE_INFO_SIZE: usize = 52;
const MAX_KEY_UNITS: usize = 256;

/// `VS_FIXEDFILEINFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedFileInfo {
    /// `dwStrucVersion`
    pub struct_version: u32,
    /// High half of the file version
    pub file_version_ms: u32,
    /// Low half of the file version
    pub file_version_ls: u32,
    /// High half of the product version
    pub product_version_ms: u32,
    /// Low half of the product version
    pub product_version_ls: u32,
    /// Valid bits of `file_flags`
    pub file_flags_mask: u32,
    /// `VS_FF_*` flags
    pub file_flags: u32,
    /// Target operating system
    pub file_os: u32,
    /// `VFT_*` type
    pub file_type: u32,
    /// `VFT2_*` subtype
    pub file_subtype: u32,
    /// High half of the file date
    pub file_date_ms: u32,
    /// Low half of the file date
    pub file_date_ls: u32,
}

/// A four-part `major.minor.build.revision` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionQuad(pub u16, pub u16, pub u16, pub u16);

impl VersionQuad {
    fn from_halves(ms: u32, ls: u32) -> Self {
        VersionQuad((ms >> 16) as u16, ms as u16, (ls >> 16) as u16, ls as u16)
    }
}

impl fmt::Display for VersionQuad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0, self.1, self.2, self.3)
    }
}

impl FixedFileInfo {
    /// The file version.
    #[must_use]
    pub fn file_version(&self) -> VersionQuad {
        VersionQuad::from_halves(self.file_version_ms, self.file_version_ls)
    }

    /// The product version.
    #[must_use]
    pub fn product_version(&self) -> VersionQuad {
        VersionQuad::from_halves(self.product_version_ms, self.product_version_ls)
    }
}

/// One `StringTable` of a `StringFileInfo` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringTable {
    /// Language and code page as 8 hex digits, e.g. `040904b0`
    pub key: String,
    /// Key/value pairs in file order
    pub entries: Vec<(String, String)>,
}

/// Decoded version resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionInfo {
    /// Fixed part, absent when the signature does not match
    pub fixed: Option<FixedFileInfo>,
    /// String tables
    pub string_tables: Vec<StringTable>,
    /// `(language, code page)` pairs from `VarFileInfo\Translation`
    pub translations: Vec<(u16, u16)>,
}

impl VersionInfo {
    /// Looks up a string value in any table, e.g. `ProductName`.
    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.string_tables
            .iter()
            .flat_map(|table| table.entries.iter())
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Decodes a `VS_VERSIONINFO` blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the root block is truncated.
    pub fn parse(data: &[u8]) -> Result<VersionInfo> {
        let mut parser = Parser::new(data);
        let root = Block::read(&mut parser)?;

        let mut info = VersionInfo::default();
        if root.value.len() >= FIXED_FILE_INFO_SIZE {
            info.fixed = parse_fixed(root.value);
        }

        for child in root.children(data) {
            match child.key.as_str() {
                "StringFileInfo" => {
                    for table in child.children(data) {
                        let entries = table
                            .children(data)
                            .map(|entry| (entry.key.clone(), entry.text()))
                            .collect();
                        info.string_tables.push(StringTable {
                            key: table.key.clone(),
                            entries,
                        });
                    }
                }
                "VarFileInfo" => {
                    for var in child.children(data) {
                        if var.key == "Translation" {
                            info.translations.extend(var.value.chunks_exact(4).map(|pair| {
                                (
                                    u16::from_le_bytes([pair[0], pair[1]]),
                                    u16::from_le_bytes([pair[2], pair[3]]),
                                )
                            }));
                        }
                    }
                }
                other => log::debug!("ignoring version block '{other}'"),
            }
        }

        Ok(info)
    }
}

fn parse_fixed(value: &[u8]) -> Option<FixedFileInfo> {
    let mut parser = Parser::new(value);
    if parser.read_le::<u32>().ok()? != VS_FFI_SIGNATURE {
        log::debug!("VS_FIXEDFILEINFO signature mismatch");
        return None;
    }

    let mut next = || parser.read_le::<u32>().ok();
    Some(FixedFileInfo {
        struct_version: next()?,
        file_version_ms: next()?,
        file_version_ls: next()?,
        product_version_ms: next()?,
        product_version_ls: next()?,
        file_flags_mask: next()?,
        file_flags: next()?,
        file_os: next()?,
        file_type: next()?,
        file_subtype: next()?,
        file_date_ms: next()?,
        file_date_ls: next()?,
    })
}

struct Block<'a> {
    key: String,
    value_type: u16,
    value: &'a [u8],
    // absolute range of the children within the blob
    children_start: usize,
    end: usize,
}

impl<'a> Block<'a> {
    fn read(parser: &mut Parser<'a>) -> Result<Block<'a>> {
        let start = parser.pos();
        let length = usize::from(parser.read_le::<u16>()?);
        let value_length = usize::from(parser.read_le::<u16>()?);
        let value_type = parser.read_le::<u16>()?;
        let key = parser.read_utf16_terminated(MAX_KEY_UNITS)?;

        let end = (start + length).min(parser.len());
        if length < 6 {
            return Err(malformed_error!("version block at {} is {} bytes long", start, length));
        }

        let value_bytes = if value_type == 1 {
            value_length * 2
        } else {
            value_length
        };
        let _ = parser.align(4);
        let value_start = parser.pos().min(end);
        let value_end = (value_start + value_bytes).min(end);
        let value = &parser.data()[value_start..value_end];

        let children_start = (value_end + 3) & !3;
        Ok(Block {
            key,
            value_type,
            value,
            children_start: children_start.min(end),
            end,
        })
    }

    fn children(&self, data: &'a [u8]) -> impl Iterator<Item = Block<'a>> {
        let mut parser = Parser::new(&data[..self.end]);
        let mut ok = parser.seek(self.children_start).is_ok();
        std::iter::from_fn(move || {
            if !ok || parser.remaining() < 6 {
                return None;
            }
            let start = parser.pos();
            match Block::read(&mut parser) {
                Ok(block) => {
                    let next = (block.end + 3) & !3;
                    ok = next > start && parser.seek(next.min(parser.len())).is_ok();
                    Some(block)
                }
                Err(_) => None,
            }
        })
    }

    fn text(&self) -> String {
        if self.value_type != 1 {
            return String::new();
        }
        let units = self
            .value
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0);
        widestring::decode_utf16_lossy(units).collect()
    }
}

impl PeFile {
    /// Decodes the first `RT_VERSION` resource.
    #[must_use]
    pub fn version_info(&self) -> Option<VersionInfo> {
        let record = self
            .resources()
            .into_iter()
            .find(|record| record.ids[0] == ResourceName::Id(RT_VERSION))?;
        let data = self.resource_bytes(&record)?;

        match VersionInfo::parse(data) {
            Ok(info) => Some(info),
            Err(error) => {
                log::debug!("version resource is malformed: {error}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{build_resources, build_version_info, dir, open, ResKey, TestImage};

    #[test]
    fn parse_blob() {
        let blob = build_version_info(
            (1, 2, 3, 4),
            &[("CompanyName", "Example Corp"), ("ProductName", "Sample")],
        );
        let info = VersionInfo::parse(&blob).unwrap();

        let fixed = info.fixed.unwrap();
        assert_eq!(fixed.file_version(), VersionQuad(1, 2, 3, 4));
        assert_eq!(fixed.product_version().to_string(), "1.2.3.4");
        assert_eq!(info.string_tables.len(), 1);
        assert_eq!(info.string_tables[0].key, "040904b0");
        assert_eq!(info.string("ProductName"), Some("Sample"));
        assert_eq!(info.string("CompanyName"), Some("Example Corp"));
        assert_eq!(info.string("Missing"), None);
    }

    #[test]
    fn from_resource_directory() {
        let blob = build_version_info((10, 0, 19041, 1), &[("FileDescription", "Test")]);
        let data = build_resources(0x3000, &[(ResKey::Id(16), ResKey::Id(1), ResKey::Id(0x409), blob)]);
        let size = data.len() as u32;
        let pe = open(
            &TestImage::new(true)
                .section(".rsrc", 0x3000, data)
                .directory(dir::RESOURCE, 0x3000, size),
        );

        let info = pe.version_info().unwrap();
        assert_eq!(info.fixed.unwrap().file_version().to_string(), "10.0.19041.1");
        assert_eq!(info.string("FileDescription"), Some("Test"));
    }

    #[test]
    fn truncated_blob_is_an_error() {
        assert!(VersionInfo::parse(&[0x10, 0x00]).is_err());
    }
}
