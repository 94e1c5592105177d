//! Resource directory walkers.
//!
//! Resources form a tree of `IMAGE_RESOURCE_DIRECTORY` nodes. Every node is a 16-byte header
//! followed by named entries, then id entries, each 8 bytes wide:
//!
//! ```text
//! +0  Name          high bit set: offset of a length-prefixed UTF-16 name, else an id
//! +4  OffsetToData  high bit set: offset of a subdirectory, else of a data entry
//! ```
//!
//! All offsets are relative to the start of the resource directory. By convention the tree
//! has exactly three levels (type, name, language); [`PeFile::resources`] flattens that shape
//! into [`ResourceRecord`]s while [`PeFile::resource_tree`] exposes arbitrary depth.
//!
//! Directories whose `Characteristics` is non-zero or that declare more entries than
//! [`crate::ParseLimits::max_resource_entries`] are rejected and contribute nothing; the rest
//! of the tree is still returned.

use std::fmt;

use crate::pe::{
    constants::{
        RESOURCE_DATA_ENTRY_SIZE, RESOURCE_DATA_IS_DIRECTORY, RESOURCE_DIRECTORY_SIZE,
        RESOURCE_ENTRY_SIZE, RESOURCE_NAME_IS_STRING,
    },
    DataDirectoryType, MemoryMap, PeFile,
};

/// A resource identifier: numeric id or UTF-16 name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceName {
    /// Numeric identifier
    Id(u32),
    /// Name string
    Name(String),
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceName::Id(id) => write!(f, "#{id}"),
            ResourceName::Name(name) => f.write_str(name),
        }
    }
}

/// A leaf of the conventional type / name / language tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Type, name and language identifiers
    pub ids: [ResourceName; 3],
    /// RVA of the payload
    pub data_rva: u32,
    /// Backing store offset of the payload, `None` when the RVA does not translate
    pub data_offset: Option<u64>,
    /// Payload size
    pub size: u32,
    /// Code page of the payload
    pub code_page: u32,
}

/// `IMAGE_RESOURCE_DATA_ENTRY` of a tree leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceData {
    /// RVA of the payload
    pub data_rva: u32,
    /// Payload size
    pub size: u32,
    /// Code page of the payload
    pub code_page: u32,
    /// Backing store offset of the payload
    pub data_offset: Option<u64>,
}

/// A node of the generic resource tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePosition {
    /// Entry name, `Id(0)` for the root
    pub name: ResourceName,
    /// Offset of the directory or data entry relative to the resource root
    pub offset: u32,
    /// Directory timestamp, 0 for leaves
    pub time_date_stamp: u32,
    /// Directory major version
    pub major_version: u16,
    /// Directory minor version
    pub minor_version: u16,
    /// Subdirectories and leaves in entry order
    pub children: Vec<ResourcePosition>,
    /// Data entry for leaves
    pub data: Option<ResourceData>,
}

impl ResourcePosition {
    /// Returns `true` for data entries.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.data.is_some()
    }

    /// Number of leaves below this node.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(ResourcePosition::leaf_count).sum()
        }
    }
}

struct DirectoryHeader {
    time_date_stamp: u32,
    major_version: u16,
    minor_version: u16,
    entries: Vec<DirectoryEntry>,
}

struct DirectoryEntry {
    name: ResourceName,
    is_directory: bool,
    offset: u32,
}

struct TreeWalk {
    /// Directory offsets from the root down to the parent of the current node.
    ancestors: Vec<u32>,
    /// Directories left to expand.
    budget: usize,
}

impl PeFile {
    /// Flattens the three-level resource tree.
    ///
    /// Leaves found at any other depth are ignored.
    #[must_use]
    pub fn resources(&self) -> Vec<ResourceRecord> {
        let Some(directory) = self.data_directory(DataDirectoryType::Resource) else {
            return Vec::new();
        };
        let map = self.map();
        let root = u64::from(directory.virtual_address);

        let mut records = Vec::new();
        let Some(types) = self.resource_directory(&map, root, 0) else {
            return records;
        };
        for ty in types.entries.iter().filter(|entry| entry.is_directory) {
            let Some(names) = self.resource_directory(&map, root, ty.offset) else {
                continue;
            };
            for name in names.entries.iter().filter(|entry| entry.is_directory) {
                let Some(languages) = self.resource_directory(&map, root, name.offset) else {
                    continue;
                };
                for language in languages.entries.iter().filter(|entry| !entry.is_directory) {
                    if self.is_cancelled() {
                        return records;
                    }
                    let Some(data) = self.resource_data_entry(&map, root, language.offset) else {
                        continue;
                    };
                    records.push(ResourceRecord {
                        ids: [ty.name.clone(), name.name.clone(), language.name.clone()],
                        data_rva: data.data_rva,
                        data_offset: data.data_offset,
                        size: data.size,
                        code_page: data.code_page,
                    });
                }
            }
        }

        records
    }

    /// Walks the resource tree to any depth.
    ///
    /// A subdirectory that is its own ancestor is skipped, as is anything deeper than
    /// [`crate::ParseLimits::max_resource_depth`]. Subdirectories shared by several entries
    /// appear under each of them, up to `max_resource_entries * max_resource_depth` expanded
    /// directories in total.
    #[must_use]
    pub fn resource_tree(&self) -> Option<ResourcePosition> {
        let directory = self.data_directory(DataDirectoryType::Resource)?;
        let map = self.map();
        let limits = &self.options().limits;
        let mut walk = TreeWalk {
            ancestors: Vec::new(),
            budget: limits
                .max_resource_entries
                .saturating_mul(limits.max_resource_depth),
        };
        self.resource_node(
            &map,
            u64::from(directory.virtual_address),
            ResourceName::Id(0),
            0,
            &mut walk,
        )
    }

    /// Payload bytes of a resource record.
    #[must_use]
    pub fn resource_bytes(&self, record: &ResourceRecord) -> Option<&[u8]> {
        self.file()
            .read_array(record.data_offset?, record.size as usize)
            .ok()
    }

    fn resource_node(
        &self,
        map: &MemoryMap,
        root: u64,
        name: ResourceName,
        offset: u32,
        walk: &mut TreeWalk,
    ) -> Option<ResourcePosition> {
        if walk.ancestors.contains(&offset) {
            log::debug!("resource directory at +0x{offset:x} is its own ancestor, skipping");
            return None;
        }
        if walk.budget == 0 {
            log::warn!("resource tree expands too many directories, truncating");
            return None;
        }
        walk.budget -= 1;

        let header = self.resource_directory(map, root, offset)?;
        let depth = walk.ancestors.len();
        let mut node = ResourcePosition {
            name,
            offset,
            time_date_stamp: header.time_date_stamp,
            major_version: header.major_version,
            minor_version: header.minor_version,
            children: Vec::new(),
            data: None,
        };

        for entry in header.entries {
            if self.is_cancelled() {
                break;
            }
            if entry.is_directory {
                if depth + 1 >= self.options().limits.max_resource_depth {
                    log::debug!("resource tree deeper than {depth}, truncating");
                    continue;
                }
                walk.ancestors.push(offset);
                let child = self.resource_node(map, root, entry.name, entry.offset, walk);
                walk.ancestors.pop();
                if let Some(child) = child {
                    node.children.push(child);
                }
            } else if let Some(data) = self.resource_data_entry(map, root, entry.offset) {
                node.children.push(ResourcePosition {
                    name: entry.name,
                    offset: entry.offset,
                    time_date_stamp: 0,
                    major_version: 0,
                    minor_version: 0,
                    children: Vec::new(),
                    data: Some(data),
                });
            }
        }

        Some(node)
    }

    fn resource_directory(&self, map: &MemoryMap, root: u64, offset: u32) -> Option<DirectoryHeader> {
        let limits = &self.options().limits;
        let at = map.rel_address_to_offset(root + u64::from(offset))?;
        let file = self.file();

        let characteristics = file.read_u32(at, false).ok()?;
        let time_date_stamp = file.read_u32(at + 4, false).ok()?;
        let major_version = file.read_u16(at + 8, false).ok()?;
        let minor_version = file.read_u16(at + 10, false).ok()?;
        let named = file.read_u16(at + 12, false).ok()?;
        let ids = file.read_u16(at + 14, false).ok()?;
        let count = usize::from(named) + usize::from(ids);

        if characteristics != 0 {
            log::warn!("resource directory at +0x{offset:x} has characteristics 0x{characteristics:x}, rejecting");
            return None;
        }
        if count > limits.max_resource_entries {
            log::warn!("resource directory at +0x{offset:x} declares {count} entries, rejecting");
            return None;
        }

        let mut entries = Vec::with_capacity(count);
        for index in 0..count as u64 {
            if self.is_cancelled() {
                break;
            }

            let entry_at = at + RESOURCE_DIRECTORY_SIZE + index * RESOURCE_ENTRY_SIZE;
            let (Ok(name_field), Ok(data_field)) =
                (file.read_u32(entry_at, false), file.read_u32(entry_at + 4, false))
            else {
                break;
            };

            let name = if name_field & RESOURCE_NAME_IS_STRING != 0 {
                ResourceName::Name(self.resource_string(
                    map,
                    root + u64::from(name_field & !RESOURCE_NAME_IS_STRING),
                ))
            } else {
                ResourceName::Id(name_field)
            };

            entries.push(DirectoryEntry {
                name,
                is_directory: data_field & RESOURCE_DATA_IS_DIRECTORY != 0,
                offset: data_field & !RESOURCE_DATA_IS_DIRECTORY,
            });
        }

        Some(DirectoryHeader {
            time_date_stamp,
            major_version,
            minor_version,
            entries,
        })
    }

    fn resource_string(&self, map: &MemoryMap, rva: u64) -> String {
        let Some(at) = map.rel_address_to_offset(rva) else {
            return String::new();
        };
        let Ok(length) = self.file().read_u16(at, false) else {
            return String::new();
        };
        let units = usize::from(length).min(self.options().limits.max_resource_name_len);
        self.file()
            .read_unicode_string(at + 2, units, false)
            .unwrap_or_default()
    }

    fn resource_data_entry(&self, map: &MemoryMap, root: u64, offset: u32) -> Option<ResourceData> {
        let at = map.rel_address_to_offset(root + u64::from(offset))?;
        let raw = self
            .file()
            .read_array(at, RESOURCE_DATA_ENTRY_SIZE as usize)
            .ok()?;
        let field = |index: usize| {
            u32::from_le_bytes([raw[index], raw[index + 1], raw[index + 2], raw[index + 3]])
        };

        let data_rva = field(0);
        Some(ResourceData {
            data_rva,
            size: field(4),
            code_page: field(8),
            data_offset: map.rel_address_to_offset(u64::from(data_rva)),
        })
    }
}
