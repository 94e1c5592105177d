//! End-to-end reads of a synthetic image through the public API.

mod common;

use std::collections::HashSet;

use pescope::{format, pe::relocations::parse_relocations, prelude::*};

use common::{open, sample_image, signed_image, TestImage, DEFAULT_IMAGE_BASE_64};

#[test]
fn headers_and_map() {
    let pe = open(&sample_image());
    assert!(pe.is_valid());
    assert!(pe.is_64());
    assert_eq!(pe.image_base(), DEFAULT_IMAGE_BASE_64);
    assert_eq!(pe.sections().len(), 5);

    let map = pe.map();
    assert_eq!(map.bitness, Bitness::Bits64);
    assert_eq!(map.entry_point_address, DEFAULT_IMAGE_BASE_64 + 0x1000);
    assert_eq!(map.regions[0].kind, RegionKind::Header);
    assert_eq!(
        map.regions
            .iter()
            .filter(|region| region.kind == RegionKind::LoadSegment)
            .count(),
        5
    );
    assert!(map.overlay().is_none());
}

#[test]
fn translation_roundtrips_in_every_mapped_region() {
    let pe = open(&signed_image());
    let map = pe.map();

    for region in map.regions.iter().filter(|region| !region.is_virtual_only) {
        let (Some(offset), Some(_)) = (region.file_offset, region.virtual_address) else {
            continue;
        };
        for probe in [offset, offset + region.size / 2, offset + region.size - 1] {
            let address = map.offset_to_address(probe).unwrap();
            assert_eq!(map.address_to_offset(address), Some(probe));
        }
    }

    let overlay = map.overlay().expect("certificate table is overlay");
    let start = overlay.file_offset.unwrap();
    assert_eq!(map.offset_to_address(start), None);
}

#[test]
fn imports_partition_names_and_ordinals() {
    let pe = open(&sample_image());
    let imports = pe.imports();

    assert_eq!(imports.len(), 2);
    let kernel32 = &imports[0];
    assert_eq!(kernel32.library_name, "KERNEL32.DLL");
    assert_eq!(kernel32.positions.len(), 2);
    assert_eq!(kernel32.positions[0].name, "ExitProcess");
    assert!(!kernel32.positions[0].is_ordinal());
    assert_eq!(kernel32.positions[1].ordinal, Some(17));
    assert!(kernel32.positions[1].name.is_empty());

    assert_eq!(
        pe.import_slot("kernel32.dll", "ExitProcess"),
        Some(u64::from(kernel32.first_thunk))
    );
    assert_eq!(pe.import_slot("USER32.dll", "MessageBoxW"), Some(u64::from(imports[1].first_thunk)));
    assert_eq!(pe.import_slot("USER32.dll", "ExitProcess"), None);
}

#[test]
fn exports_by_name_and_ordinal() {
    let pe = open(&sample_image());

    let exports = pe.exports(true).unwrap();
    assert_eq!(exports.dll_name, "sample.dll");
    assert_eq!(exports.base, 1);
    assert_eq!(exports.number_of_functions, 3);
    assert_eq!(exports.by_name("Start").unwrap().rva, 0x1000);
    assert_eq!(exports.by_name("Stop").unwrap().ordinal, 3);
    assert_eq!(exports.by_ordinal(2).map(|export| export.name.as_str()), Some(""));
    assert!(exports.positions.iter().all(|export| export.forwarder.is_none()));
}

#[test]
fn resources_and_version() {
    let pe = open(&sample_image());
    let records = pe.resources();

    assert_eq!(records.len(), 2);
    let triples: HashSet<_> = records.iter().map(|record| record.ids.clone()).collect();
    assert_eq!(triples.len(), 2);
    assert_eq!(pe.resource_tree().unwrap().leaf_count(), 2);

    let manifest = records
        .iter()
        .find(|record| record.ids[0] == ResourceName::Id(24))
        .unwrap();
    assert_eq!(pe.resource_bytes(manifest).unwrap(), b"<assembly/>");

    let version = pe.version_info().unwrap();
    assert_eq!(version.fixed.unwrap().file_version().to_string(), "1.2.3.4");
    assert_eq!(version.string("ProductName"), Some("Sample"));
}

#[test]
fn relocations_decode_and_reencode() {
    let pe = open(&sample_image());

    let rvas: Vec<u32> = pe.relocs_as_rva_list().into_iter().collect();
    assert_eq!(rvas, vec![0x1004, 0x1010]);

    let encoded = pescope::pe::relocations::relocs_to_bytes(&rvas, true);
    let decoded: Vec<u32> = parse_relocations(&encoded)
        .iter()
        .flat_map(|block| block.rvas().collect::<Vec<_>>())
        .collect();
    assert_eq!(decoded, rvas);
}

#[test]
fn authenticode_signer() {
    let pe = open(&signed_image());

    let certificates = pe.certificates();
    assert_eq!(certificates.len(), 1);
    assert!(certificates[0].is_authenticode());

    let signatures = pe.signatures();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].serial, "330012");
    assert_eq!(signatures[0].issuer, "C=US, CN=Example Root CA");
    assert_eq!(signatures[0].subject.as_deref(), Some("C=US, CN=Example Publisher"));
    assert_eq!(signatures[0].digest_name(), Some("sha256"));
}

#[test]
fn absent_directories_read_empty() {
    let pe = open(&TestImage::new(false).section(".text", 0x1000, vec![0xC3; 0x10]));

    assert!(pe.imports().is_empty());
    assert!(pe.exports(true).is_none());
    assert!(pe.resources().is_empty());
    assert!(pe.relocations().is_empty());
    assert!(pe.tls_directory().is_none());
    assert!(pe.load_config().is_none());
    assert!(pe.debug_directories().is_empty());
    assert!(pe.dotnet().is_none());
    assert!(pe.certificates().is_empty());
}

#[test]
fn garbage_is_invalid_not_an_error() {
    let pe = PeFile::from_mem(b"MZ\x00\x00not a portable executable".to_vec()).unwrap();
    assert!(!pe.is_valid());
    assert!(pe.sections().is_empty());
    assert!(pe.imports().is_empty());

    assert!(matches!(PeFile::from_mem(Vec::new()), Err(Error::Empty)));
}

#[test]
fn format_dispatch() {
    let data = sample_image().build();
    assert_eq!(FormatKind::detect(&data), FormatKind::Pe);

    let parsed = format::open(data, ParserOptions::default()).unwrap();
    let info = parsed.format_info();
    assert_eq!(info.machine, "AMD64");
    assert_eq!(info.entry_point, Some(DEFAULT_IMAGE_BASE_64 + 0x1000));

    assert!(matches!(
        format::open(b"\x7fELF\x02\x01\x01".to_vec(), ParserOptions::default()),
        Err(Error::NotSupported)
    ));
}

#[test]
fn loaded_image_dump() {
    let image = sample_image();
    let file = open(&image);

    // lay the file out as the loader would
    let map = file.map();
    let mut dump = vec![0u8; map.image_size as usize];
    for region in &map.regions {
        let (Some(offset), Some(address)) = (region.file_offset, region.virtual_address) else {
            continue;
        };
        let rva = (address - map.module_base_address) as usize;
        let len = (region.size as usize)
            .min(file.data().len() - offset as usize)
            .min(dump.len() - rva);
        dump[rva..rva + len].copy_from_slice(&file.data()[offset as usize..offset as usize + len]);
    }

    let base = 0x7FF6_1234_0000;
    let pe = PeFile::from_mem_with_options(dump, ParserOptions::loaded_image(base)).unwrap();
    assert_eq!(pe.map().mode, MapMode::Image);
    assert_eq!(pe.module_base(), base);
    assert_eq!(pe.map().entry_point_address, base + 0x1000);
    assert_eq!(pe.imports(), file.imports());
    assert_eq!(pe.exports(true), file.exports(true));
}
