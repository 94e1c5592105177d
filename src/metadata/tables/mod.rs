//! The `#~` table stream.
//!
//! Metadata tables are stored back to back after a small header. Nothing in the stream
//! records where a table starts: the header lists row counts for the tables present, and the
//! row width of every table follows from the column layout in [`columns`] once the widths of
//! heap, table and coded indexes are known. [`TablesHeader`] performs that computation and
//! hands out raw rows.
//!
//! # Reference
//! - [ECMA-335 II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod codedindex;
mod header;
mod schema;
mod tableid;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use header::{TableSummary, TablesHeader};
pub use schema::{columns, Column, ColumnDef};
pub use tableid::TableId;
