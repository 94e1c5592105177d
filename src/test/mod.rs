//! Shared fixtures for unit tests.
//!
//! [`image`] is written against `std` only so the integration tests under `tests/` can include
//! the same file through `#[path]`.


pub use image::*;

use crate::{config::ParserOptions, PeFile};

/// Builds the image and opens it from memory.
pub fn open(image: &TestImage) -> PeFile {
    PeFile::from_mem(image.build()).expect("synthetic image is never empty")
}

/// Builds the image and opens it with explicit options.
pub fn open_with(image: &TestImage, options: ParserOptions) -> PeFile {
    PeFile::from_mem_with_options(image.build(), options).expect("synthetic image is never empty")
}
