//! CLI (.NET) metadata of managed images.
//!
//! Only the geometry is decoded: the COR20 header, the metadata root, the four heaps and the
//! layout of the `#~` table stream. Signatures and IL bodies are left as raw bytes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::{metadata::tables::TableId, PeFile};
//!
//! let pe = PeFile::from_file("tests/samples/Hello.dll".as_ref())?;
//! if let Some(clr) = pe.dotnet() {
//!     println!("runtime {}", clr.root.version);
//!     println!("module {:?}", clr.module_name());
//!     if let Some(tables) = clr.tables() {
//!         println!("{} types", tables.row_count(TableId::TypeDef));
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

mod clr;
pub mod cor20header;
pub mod root;
pub mod streams;
pub mod tables;

pub use clr::CliMetadata;
