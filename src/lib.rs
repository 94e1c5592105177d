// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0


#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # pescope
//!
//! A tolerant reader and editor for Windows Portable Executable (PE32 / PE32+) images, written
//! for reverse-engineering and file identification tools.
//!
//! Adversarial input is the normal case: the parser reconciles raw file offsets with loaded
//! virtual addresses, walks every data directory and recovers from corruption locally
//! (clamping, defaults, early termination) instead of failing the whole image.
//!
//! ## Features
//!
//! - **Memory map** - header, section, virtual-only and overlay regions in file or image layout,
//!   with total address translation
//! - **Directory walkers** - imports, delay imports, bound imports, exports, resources and
//!   version info, relocations, TLS, load config, debug / CodeView
//! - **.NET metadata** - CLI header, metadata root, heaps and `#~` table geometry
//! - **Authenticode** - certificate table walk and a minimal DER reader
//! - **Mutation** - add, remove and split sections, rebuild imports and relocations, fix the
//!   checksum, all through a transactional rewrite plan
//! - **Cancellation** - every unbounded walk polls a shared [`CancellationToken`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let pe = PeFile::from_file("tests/samples/sample.exe".as_ref())?;
//! for import in pe.imports() {
//!     println!("{}: {} functions", import.library_name, import.positions.len());
//! }
//! for region in &pe.memory_map(MapMode::File).regions {
//!     println!("{:<10} 0x{:x}", region.name, region.size);
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - the byte accessor over memory or a memory-mapped file
//! - [`pe`] - headers, memory map, directory walkers and the mutation engine
//! - [`metadata`] - CLI metadata of managed images
//! - [`security`] - the attribute certificate table and DER reader
//! - [`format`] - signature sniffing and format dispatch
//! - [`config`] - parser options and resource limits
//! - [`Error`] and [`Result`] - error handling

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

pub mod config;
pub mod file;
pub mod format;
pub mod metadata;
pub mod pe;
pub mod prelude;
pub mod security;
pub mod utils;

/// `pescope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `pescope` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{Error, PeFile};
///
/// match PeFile::from_file(std::path::Path::new("missing.exe")) {
///     Ok(pe) => println!("valid: {}", pe.is_valid()),
///     Err(Error::FileError(error)) => println!("I/O: {error}"),
///     Err(error) => println!("error: {error}"),
/// }
/// ```
pub use error::Error;

pub use config::{ParseLimits, ParserOptions};
pub use file::{parser::Parser, File};
pub use pe::{
    DataDirectory, DataDirectoryType, MapMode, MemoryMap, PeFile, Region, RegionKind,
    SectionFlags, SectionHeader,
};
pub use utils::CancellationToken;
