use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::{
        io::{read_le, read_le_sized},
        parser::Parser,
    },
    metadata::tables::{columns, CodedIndex, Column, TableId},
    Error::OutOfBounds,
    Result,
};

/// `HeapSizes` bit for 4-byte `#Strings` indexes.
const LARGE_STRINGS: u8 = 0x01;
/// `HeapSizes` bit for 4-byte `#GUID` indexes.
const LARGE_GUID: u8 = 0x02;
/// `HeapSizes` bit for 4-byte `#Blob` indexes.
const LARGE_BLOB: u8 = 0x04;
/// `HeapSizes` bit announcing 4 extra bytes after the row counts.
const EXTRA_DATA: u8 = 0x40;

/// Fixed part of the header before the row counts.
const HEADER_SIZE: usize = 24;

/// Row count of one present table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    /// Table
    pub table_id: TableId,
    /// Number of rows
    pub row_count: u32,
}

/// Header of the `#~` stream with the derived table geometry.
#[derive(Debug, Clone)]
pub struct TablesHeader<'a> {
    data: &'a [u8],
    /// Schema major version, 2
    pub major_version: u8,
    /// Schema minor version, 0
    pub minor_version: u8,
    /// Index width flags for the heaps
    pub heap_sizes: u8,
    /// Presence bit vector
    pub valid: u64,
    /// Sorted bit vector
    pub sorted: u64,
    rows: [u32; TableId::COUNT],
    row_sizes: [u32; TableId::COUNT],
    offsets: [u64; TableId::COUNT],
}

impl<'a> TablesHeader<'a> {
    /// Decodes the header and lays out every known table.
    ///
    /// Row counts of tables this crate has no layout for are skipped with a warning; they
    /// can only follow the known ones, so the geometry stays intact. A stream too short for
    /// the computed tables is accepted and rows past its end read as `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header or row counts are truncated and
    /// [`crate::Error::Malformed`] if no table is present.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < HEADER_SIZE {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("no metadata table is present"));
        }

        let mut parser = Parser::new(data);
        parser.seek(HEADER_SIZE)?;

        let mut rows = [0u32; TableId::COUNT];
        for bit in 0..u64::BITS {
            if valid & (1u64 << bit) == 0 {
                continue;
            }
            let count = parser.read_le::<u32>()?;
            match u8::try_from(bit).ok().and_then(TableId::from_repr) {
                Some(table) => rows[table as usize] = count,
                None => log::warn!("unknown metadata table 0x{bit:02x} with {count} rows"),
            }
        }

        let heap_sizes = data[6];
        if heap_sizes & EXTRA_DATA != 0 {
            parser.advance_by(4)?;
        }

        let mut header = TablesHeader {
            data,
            major_version: data[4],
            minor_version: data[5],
            heap_sizes,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            rows,
            row_sizes: [0; TableId::COUNT],
            offsets: [0; TableId::COUNT],
        };

        let mut offset = parser.pos() as u64;
        for table in TableId::iter() {
            let size = columns(table)
                .iter()
                .map(|(_, column)| u32::from(header.column_width(*column)))
                .sum::<u32>();
            header.row_sizes[table as usize] = size;
            header.offsets[table as usize] = offset;
            offset += u64::from(size) * u64::from(header.rows[table as usize]);
        }
        if offset > data.len() as u64 {
            log::warn!(
                "tables need 0x{offset:x} bytes, the stream holds 0x{:x}",
                data.len()
            );
        }

        Ok(header)
    }

    /// Byte width of a column under this header's row counts and heap flags.
    #[must_use]
    pub fn column_width(&self, column: Column) -> u8 {
        let wide = |flag: u8| if self.heap_sizes & flag != 0 { 4 } else { 2 };
        match column {
            Column::Fixed(width) => width,
            Column::Str => wide(LARGE_STRINGS),
            Column::Guid => wide(LARGE_GUID),
            Column::Blob => wide(LARGE_BLOB),
            Column::Index(table) => {
                if self.row_count(table) > u32::from(u16::MAX) {
                    4
                } else {
                    2
                }
            }
            Column::Coded(kind) => {
                let largest = kind
                    .tables()
                    .iter()
                    .flatten()
                    .map(|table| self.row_count(*table))
                    .max()
                    .unwrap_or(0);
                if largest >= 1 << (16 - kind.tag_bits()) {
                    4
                } else {
                    2
                }
            }
        }
    }

    /// Returns `true` if the presence vector lists `table`.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & table.mask() != 0
    }

    /// Number of tables in the presence vector, unknown ones included.
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Known tables that are present, in stream order.
    pub fn present_tables(&self) -> impl Iterator<Item = TableId> + '_ {
        TableId::iter().filter(|&table| self.has_table(table))
    }

    /// Row count, 0 for absent tables.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    /// Byte width of one row.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        self.row_sizes[table as usize]
    }

    /// Offset of the first row within the stream.
    #[must_use]
    pub fn table_offset(&self, table: TableId) -> u64 {
        self.offsets[table as usize]
    }

    /// Row counts of all present known tables.
    #[must_use]
    pub fn table_summary(&self) -> Vec<TableSummary> {
        self.present_tables()
            .map(|table_id| TableSummary {
                table_id,
                row_count: self.row_count(table_id),
            })
            .collect()
    }

    /// Raw bytes of row `rid` (1-based), `None` if absent or past the stream.
    #[must_use]
    pub fn row(&self, table: TableId, rid: u32) -> Option<&'a [u8]> {
        if rid == 0 || rid > self.row_count(table) {
            return None;
        }
        let size = u64::from(self.row_size(table));
        let start = self.table_offset(table) + u64::from(rid - 1) * size;
        let start = usize::try_from(start).ok()?;
        self.data.get(start..start.checked_add(size as usize)?)
    }

    /// Rows of `table` in order, stopping at the end of the stream.
    pub fn rows(&self, table: TableId) -> impl Iterator<Item = &'a [u8]> + '_ {
        (1..=self.row_count(table)).map_while(move |rid| self.row(table, rid))
    }

    /// Value of the column at `index` in row `rid`.
    #[must_use]
    pub fn value(&self, table: TableId, rid: u32, index: usize) -> Option<u32> {
        let layout = columns(table);
        let (_, column) = layout.get(index)?;
        let offset = layout[..index]
            .iter()
            .map(|(_, column)| usize::from(self.column_width(*column)))
            .sum::<usize>();

        let row = self.row(table, rid)?;
        let value = read_le_sized(row, offset, self.column_width(*column)).ok()?;
        u32::try_from(value).ok()
    }

    /// Value of the named column in row `rid`.
    #[must_use]
    pub fn value_by_name(&self, table: TableId, rid: u32, name: &str) -> Option<u32> {
        let index = columns(table).iter().position(|(column, _)| *column == name)?;
        self.value(table, rid, index)
    }

    /// Decodes the named coded index column in row `rid`.
    #[must_use]
    pub fn coded_index(&self, table: TableId, rid: u32, name: &str) -> Option<CodedIndex> {
        let index = columns(table).iter().position(|(column, _)| *column == name)?;
        let Column::Coded(kind) = columns(table)[index].1 else {
            return None;
        };
        kind.decode(self.value(table, rid, index)?)
    }
}
