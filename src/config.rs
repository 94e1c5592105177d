//! Parser configuration
//!
//! This module provides the options a [`crate::PeFile`] is opened with: which coordinate space
//! the default memory map uses, an optional module base overriding the header's `ImageBase`,
//! and the sanity limits every directory walker enforces on counts and depths read from the
//! image.

use crate::pe::MapMode;

/// Upper bounds applied to attacker-controlled counts and recursion depths.
///
/// Exceeding a limit never fails the parse: the walker stops at the bound and the caller
/// receives a partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum number of section headers considered (default: 100)
    pub max_sections: usize,
    /// Maximum `NumberOfIdEntries + NumberOfNamedEntries` of one resource directory (default: 1000)
    pub max_resource_entries: usize,
    /// Maximum length of a resource name in UTF-16 code units (default: 1024)
    pub max_resource_name_len: usize,
    /// Exclusive bound for `NumberOfFunctions` and `NumberOfNames` of the export directory (default: 0x10000)
    pub max_export_entries: usize,
    /// Maximum depth of the generic resource tree (default: 32)
    pub max_resource_depth: usize,
    /// Maximum nesting of DER records in a certificate (default: 32)
    pub max_cert_depth: usize,
    /// Maximum number of debug directory entries (default: 64)
    pub max_debug_entries: usize,
    /// Maximum number of TLS callbacks (default: 0x1000)
    pub max_tls_callbacks: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_sections: 100,
            max_resource_entries: 1000,
            max_resource_name_len: 1024,
            max_export_entries: 0x10000,
            max_resource_depth: 32,
            max_cert_depth: 32,
            max_debug_entries: 64,
            max_tls_callbacks: 0x1000,
        }
    }
}

impl ParseLimits {
    /// Tighter limits for triaging untrusted samples in bulk.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_sections: 96,
            max_resource_entries: 256,
            max_resource_name_len: 256,
            max_export_entries: 0x4000,
            max_resource_depth: 8,
            max_cert_depth: 16,
            max_debug_entries: 16,
            max_tls_callbacks: 64,
        }
    }
}

/// Options a [`crate::PeFile`] is opened with.
///
/// # Examples
///
/// ```rust
/// use pescope::{MapMode, ParserOptions};
///
/// let options = ParserOptions::loaded_image(0x7FF6_0000_0000);
/// assert_eq!(options.mode, MapMode::Image);
/// assert_eq!(options.module_base, Some(0x7FF6_0000_0000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Coordinate space of the input: raw file layout or a loaded image dump
    pub mode: MapMode,
    /// Base address used for VA computations instead of the header's `ImageBase`
    pub module_base: Option<u64>,
    /// Sanity limits
    pub limits: ParseLimits,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            mode: MapMode::File,
            module_base: None,
            limits: ParseLimits::default(),
        }
    }
}

impl ParserOptions {
    /// Options for an image dumped from a process, loaded at `base`.
    #[must_use]
    pub fn loaded_image(base: u64) -> Self {
        Self {
            mode: MapMode::Image,
            module_base: Some(base),
            limits: ParseLimits::default(),
        }
    }

    /// Replaces the limits, keeping the other options.
    #[must_use]
    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }
}
