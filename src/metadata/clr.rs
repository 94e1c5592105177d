//! Entry point from a PE image into its CLI metadata.

use uguid::Guid;

use crate::{
    metadata::{
        cor20header::Cor20Header,
        root::Root,
        streams::{Blob, Guids, Strings, UserStrings},
        tables::{TableId, TablesHeader},
    },
    pe::{constants::COR20_HEADER_SIZE, DataDirectoryType, PeFile},
    utils::CancellationToken,
};

/// CLI header and metadata of a managed image.
///
/// Streams are located lazily; every accessor re-reads from the borrowed metadata bytes.
#[derive(Debug, Clone)]
pub struct CliMetadata<'a> {
    /// The COR20 header
    pub header: Cor20Header,
    /// The metadata root and its stream directory
    pub root: Root,
    data: &'a [u8],
    cancel: CancellationToken,
}

impl<'a> CliMetadata<'a> {
    /// Raw metadata bytes, starting at the `BSJB` signature.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn stream(&self, name: &str) -> Option<&'a [u8]> {
        self.root.stream_data(self.data, name).ok()
    }

    /// The `#Strings` heap.
    #[must_use]
    pub fn strings(&self) -> Option<Strings<'a>> {
        Strings::from(self.stream("#Strings")?).ok()
    }

    /// The `#US` heap.
    #[must_use]
    pub fn user_strings(&self) -> Option<UserStrings<'a>> {
        UserStrings::from(self.stream("#US")?).ok()
    }

    /// The `#Blob` heap.
    #[must_use]
    pub fn blobs(&self) -> Option<Blob<'a>> {
        Blob::from(self.stream("#Blob")?).ok()
    }

    /// The `#GUID` heap.
    #[must_use]
    pub fn guids(&self) -> Option<Guids<'a>> {
        self.stream("#GUID").map(Guids::from)
    }

    /// The table stream header, from `#~` or the uncompressed `#-`.
    #[must_use]
    pub fn tables(&self) -> Option<TablesHeader<'a>> {
        let stream = self.root.tables_stream()?;
        let data = self.stream(&stream.name)?;
        match TablesHeader::from(data) {
            Ok(tables) => Some(tables),
            Err(error) => {
                log::debug!("table stream rejected: {error}");
                None
            }
        }
    }

    /// All rows of `table`.
    ///
    /// Stops early with the rows read so far when the image's cancellation token fires.
    #[must_use]
    pub fn rows(&self, table: TableId) -> Vec<&'a [u8]> {
        let Some(tables) = self.tables() else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for row in tables.rows(table) {
            if self.cancel.is_cancelled() {
                break;
            }
            rows.push(row);
        }
        rows
    }

    fn string_column(&self, table: TableId, rid: u32, column: &str) -> Option<String> {
        let index = self.tables()?.value_by_name(table, rid, column)?;
        self.strings()?.get(index as usize).ok()
    }

    /// Name of the module from row 1 of the `Module` table.
    #[must_use]
    pub fn module_name(&self) -> Option<String> {
        self.string_column(TableId::Module, 1, "Name")
    }

    /// Module version id.
    #[must_use]
    pub fn mvid(&self) -> Option<Guid> {
        let index = self.tables()?.value_by_name(TableId::Module, 1, "Mvid")?;
        self.guids()?.get(index as usize).ok()
    }

    /// Name of the assembly, `None` for modules without an `Assembly` row.
    #[must_use]
    pub fn assembly_name(&self) -> Option<String> {
        self.string_column(TableId::Assembly, 1, "Name")
    }
}

impl PeFile {
    /// Reads the CLI header and metadata root of a managed image.
    ///
    /// A metadata directory reaching past the end of the file is truncated to what is
    /// present.
    #[must_use]
    pub fn dotnet(&self) -> Option<CliMetadata<'_>> {
        let directory = self.data_directory(DataDirectoryType::ComDescriptor)?;
        let map = self.map();
        let file = self.file();

        let offset = map.rel_address_to_offset(u64::from(directory.virtual_address))?;
        let bytes = file.read_array(offset, COR20_HEADER_SIZE as usize).ok()?;
        let header = match Cor20Header::read(bytes) {
            Ok(header) => header,
            Err(error) => {
                log::debug!("CLI header at 0x{offset:x} rejected: {error}");
                return None;
            }
        };

        let start = map.rel_address_to_offset(u64::from(header.metadata.virtual_address))?;
        let available = (file.len() as u64).saturating_sub(start);
        let size = u64::from(header.metadata.size).min(available);
        if size < u64::from(header.metadata.size) {
            log::warn!(
                "metadata of 0x{:x} bytes truncated to 0x{size:x}",
                header.metadata.size
            );
        }
        let data = file.read_array(start, size as usize).ok()?;
        let root = match Root::read(data) {
            Ok(root) => root,
            Err(error) => {
                log::debug!("metadata root at 0x{start:x} rejected: {error}");
                return None;
            }
        };

        Some(CliMetadata {
            header,
            root,
            data,
            cancel: self.cancellation_token(),
        })
    }

    /// Returns `true` if the image carries a CLI header.
    #[must_use]
    pub fn is_dotnet(&self) -> bool {
        self.dotnet().is_some()
    }
}
