use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::{commands::common::Session, output::print_output};

#[derive(Debug, Serialize)]
struct ChecksumOutput {
    stored: u32,
    computed: u32,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<String>,
}

pub fn run(
    path: &Path,
    fix: bool,
    output: Option<&Path>,
    session: &Session,
) -> anyhow::Result<()> {
    let mut pe = session.open_mutable(path)?;
    let stored = pe.headers().context("image has no headers")?.optional.checksum;
    let computed = pe.compute_checksum().context("image has no headers")?;

    let mut written = None;
    if fix && stored != computed {
        pe.fix_checksum().context("failed to store the checksum")?;
        let target = output.unwrap_or(path);
        pe.save(target)
            .with_context(|| format!("failed to write {}", target.display()))?;
        written = Some(target.display().to_string());
    }

    let result = ChecksumOutput {
        stored,
        computed,
        valid: stored == computed,
        written,
    };
    print_output(&result, session.opts, |out| {
        println!("Stored:   0x{:08x}", out.stored);
        println!("Computed: 0x{:08x}", out.computed);
        if out.valid {
            println!("Checksum is valid.");
        } else if let Some(target) = &out.written {
            println!("Checksum fixed, written to {target}.");
        } else {
            println!("Checksum mismatch.");
        }
    })
}
