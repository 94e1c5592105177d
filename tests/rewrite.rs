//! Mutations applied to a synthetic image and read back.

mod common;

use std::collections::BTreeSet;

use pescope::{pe::write::compute_checksum, prelude::*};

use common::{open, sample_image, signed_image};

fn data_flags() -> SectionFlags {
    SectionFlags::CNT_INITIALIZED_DATA | SectionFlags::MEM_READ
}

fn layout_fields(pe: &PeFile) -> (u32, usize, u32) {
    let headers = pe.headers().unwrap();
    (
        headers.optional.size_of_image,
        headers.sections.len(),
        headers.optional.size_of_headers,
    )
}

#[test]
fn add_then_remove_restores_header_fields() -> Result<()> {
    let mut pe = open(&signed_image());
    let before = layout_fields(&pe);
    let original = pe.data().to_vec();

    let added = pe.add_section(".extra", &[0x5A; 0x123], data_flags())?;
    assert_eq!(added.virtual_address, 0x6000);
    assert_eq!(pe.sections().len(), 6);
    assert_eq!(pe.signatures().len(), 1, "certificate table follows the overlay");

    let removed = pe.remove_last_section()?;
    assert_eq!(removed.name_str(), ".extra");
    assert_eq!(layout_fields(&pe), before);
    assert_eq!(pe.data(), original.as_slice());
    Ok(())
}

#[test]
fn checksum_is_idempotent() -> Result<()> {
    let mut pe = open(&sample_image());
    assert!(!pe.checksum_is_valid());

    let first = pe.fix_checksum()?;
    assert!(pe.checksum_is_valid());
    assert_eq!(pe.headers().unwrap().optional.checksum, first);

    let second = pe.fix_checksum()?;
    assert_eq!(first, second);
    assert_eq!(compute_checksum(pe.data(), first), first);
    Ok(())
}

#[test]
fn checksum_tracks_content() {
    let original = sample_image().build();
    let mut changed = original.clone();
    // a byte of .text, outside the checksum field
    changed[0x400] ^= 0xFF;

    assert_ne!(compute_checksum(&original, 0), compute_checksum(&changed, 0));
}

#[test]
fn relocation_section_merges_existing_entries() -> Result<()> {
    let mut pe = open(&sample_image());
    pe.add_relocs_section(".reloc2", &[0x1020, 0x2008, 0x1004])?;

    let expected = BTreeSet::from([0x1004, 0x1010, 0x1020, 0x2008]);
    assert_eq!(pe.relocs_as_rva_list(), expected);
    assert_eq!(
        pe.data_directory(DataDirectoryType::BaseReloc)
            .unwrap()
            .virtual_address,
        0x6000
    );
    Ok(())
}

#[test]
fn import_section_keeps_existing_libraries() -> Result<()> {
    let mut pe = open(&sample_image());
    pe.add_import_section(".idata2", &[("ADVAPI32.dll", &["RegOpenKeyExW", "RegCloseKey"])])?;

    let imports = pe.imports();
    let libraries: Vec<_> = imports
        .iter()
        .map(|header| header.library_name.as_str())
        .collect();
    assert_eq!(libraries, vec!["KERNEL32.DLL", "USER32.dll", "ADVAPI32.dll"]);
    assert_eq!(imports[0].positions[0].name, "ExitProcess");
    assert_eq!(
        imports[2].function_names().collect::<Vec<_>>(),
        vec!["RegOpenKeyExW", "RegCloseKey"]
    );
    assert!(pe.import_slot("advapi32.dll", "RegCloseKey").is_some());
    Ok(())
}

#[test]
fn split_requires_aligned_offset() -> Result<()> {
    let mut data = vec![0xAA; 0x1000];
    data.extend(vec![0xBB; 0x200]);
    let mut pe = open(&common::TestImage::new(false).section(".text", 0x1000, data));

    assert!(pe.split_section(0, 0x20, ".text2").is_err());

    let (first, second) = pe.split_section(0, 0x1000, ".text2")?;
    assert_eq!(first.virtual_size, 0x1000);
    assert_eq!(second.virtual_address, 0x2000);
    assert_eq!(pe.sections().len(), 2);

    let offset = pe.rva_to_offset(0x2000).unwrap() as usize;
    assert_eq!(pe.data()[offset], 0xBB);
    Ok(())
}

#[test]
fn failed_mutation_leaves_image_untouched() {
    let mut pe = open(&sample_image());
    let original = pe.data().to_vec();

    assert!(matches!(
        pe.add_section(".waytoolongname", &[1], data_flags()),
        Err(Error::WriteLayoutFailed { .. })
    ));
    assert!(pe.add_section(".empty", &[], data_flags()).is_err());
    assert_eq!(pe.data(), original.as_slice());
}
