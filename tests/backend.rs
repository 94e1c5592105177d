//! Memory-mapped files and cancellation.

mod common;

use std::io::Write;

use pescope::prelude::*;

use common::{open, sample_image};

fn on_disk(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn mapped_file_matches_memory() -> Result<()> {
    let bytes = sample_image().build();
    let file = on_disk(&bytes);

    let mapped = PeFile::from_file(file.path())?;
    let owned = PeFile::from_mem(bytes)?;

    assert_eq!(mapped.data(), owned.data());
    assert_eq!(mapped.map(), owned.map());
    assert_eq!(mapped.imports(), owned.imports());
    assert_eq!(mapped.resources(), owned.resources());
    Ok(())
}

#[test]
fn mapped_file_is_read_only() -> Result<()> {
    let file = on_disk(&sample_image().build());
    let mut pe = PeFile::from_file(file.path())?;

    assert!(matches!(pe.fix_checksum(), Err(Error::NotSupported)));
    assert!(matches!(
        pe.add_section(".new", &[1, 2, 3], SectionFlags::MEM_READ),
        Err(Error::NotSupported)
    ));
    Ok(())
}

#[test]
fn fixed_image_survives_save() -> Result<()> {
    let mut pe = open(&sample_image());
    let checksum = pe.fix_checksum()?;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixed.exe");
    pe.save(&path)?;

    let reopened = PeFile::from_file(&path)?;
    assert!(reopened.checksum_is_valid());
    assert_eq!(reopened.headers().unwrap().optional.checksum, checksum);
    Ok(())
}

#[test]
fn missing_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        PeFile::from_file(&dir.path().join("absent.exe")),
        Err(Error::FileError(_))
    ));

    let empty = on_disk(&[]);
    assert!(PeFile::from_file(empty.path()).is_err());
}

#[test]
fn cancelled_token_stops_walks() {
    let mut pe = open(&sample_image());
    let token = CancellationToken::new();
    pe.set_cancellation_token(token.clone());
    assert_eq!(pe.imports().len(), 2);

    token.cancel();
    assert!(pe.imports().is_empty());
    assert!(pe.resources().is_empty());
    assert!(pe.relocations().is_empty());

    token.reset();
    assert_eq!(pe.relocations().len(), 1);
}
