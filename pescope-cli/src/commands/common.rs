use std::path::Path;

use anyhow::{bail, Context};
use pescope::{CancellationToken, MapMode, ParserOptions, PeFile};

use crate::app::GlobalOptions;

/// Global flags plus the token the Ctrl+C handler cancels.
pub struct Session<'a> {
    pub opts: &'a GlobalOptions,
    cancel: CancellationToken,
}

impl<'a> Session<'a> {
    pub fn new(opts: &'a GlobalOptions, cancel: CancellationToken) -> Self {
        Self { opts, cancel }
    }

    /// Memory-maps and parses the image at `path`.
    pub fn open(&self, path: &Path) -> anyhow::Result<PeFile> {
        self.open_with(path, ParserOptions::default())
    }

    /// Memory-maps and parses the image at `path` in the given coordinate space.
    pub fn open_with(&self, path: &Path, options: ParserOptions) -> anyhow::Result<PeFile> {
        let mut pe = PeFile::from_file_with_options(path, options)
            .with_context(|| format!("failed to open {}", path.display()))?;
        self.attach(&mut pe, path)?;
        Ok(pe)
    }

    /// Reads the whole image into memory so it can be rewritten.
    pub fn open_mutable(&self, path: &Path) -> anyhow::Result<PeFile> {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let mut pe = PeFile::from_mem(data)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        self.attach(&mut pe, path)?;
        Ok(pe)
    }

    fn attach(&self, pe: &mut PeFile, path: &Path) -> anyhow::Result<()> {
        if !pe.is_valid() {
            bail!("{} is not a valid PE image", path.display());
        }
        pe.set_cancellation_token(self.cancel.clone());
        Ok(())
    }

    /// Notes on stderr that the output was cut short.
    pub fn warn_if_cancelled(&self) {
        if self.cancel.is_cancelled() {
            log::warn!("walk cancelled, output is partial");
        }
    }
}

/// Options for `--image` dumps: image layout at the header's base.
pub fn image_options() -> ParserOptions {
    ParserOptions {
        mode: MapMode::Image,
        ..ParserOptions::default()
    }
}

/// Renders a Windows timestamp as seconds since the epoch, `-` for 0.
pub fn timestamp(value: u32) -> String {
    if value == 0 {
        "-".to_string()
    } else {
        format!("{value} (0x{value:08x})")
    }
}
