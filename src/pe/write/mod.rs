//! Section mutation engine.
//!
//! Every mutation follows the same three steps:
//!
//! 1. inspect the current headers and build a [`RewritePlan`],
//! 2. apply the plan to a copy of the backing bytes,
//! 3. hand the copy to the backend in one `replace` and re-parse the headers.
//!
//! A failure in step 1 or 2 leaves the backend untouched. Memory-mapped files are read-only
//! and reject step 3 with [`crate::Error::NotSupported`]; open the image from memory to
//! mutate it and [`PeFile::save`] the result.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::{PeFile, SectionFlags};
//! use std::path::Path;
//!
//! let mut pe = PeFile::from_mem(std::fs::read("input.exe")?)?;
//! let section = pe.add_section(
//!     ".extra",
//!     &[0xCC; 0x100],
//!     SectionFlags::CNT_INITIALIZED_DATA | SectionFlags::MEM_READ,
//! )?;
//! println!("new section at rva 0x{:x}", section.virtual_address);
//! pe.fix_checksum()?;
//! pe.save(Path::new("output.exe"))?;
//! # Ok::<(), pescope::Error>(())
//! ```

mod checksum;
mod directories;
mod plan;
mod sections;

pub use checksum::compute_checksum;
pub use plan::RewritePlan;

use crate::{pe::PeFile, Error, Result};

impl PeFile {
    /// Applies a plan to a copy of the image and replaces the backing bytes with the result.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] for read-only backends and
    /// [`Error::WriteLayoutFailed`] if the plan does not fit the image.
    pub fn apply_plan(&mut self, plan: &RewritePlan) -> Result<()> {
        if !self.file_mut().is_writable() {
            return Err(Error::NotSupported);
        }

        let bytes = plan.apply(self.data())?;
        log::debug!(
            "rewriting image: {} -> {} bytes",
            self.file().len(),
            bytes.len()
        );
        self.file_mut().replace(bytes)?;
        self.refresh();
        Ok(())
    }
}
