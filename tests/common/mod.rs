//! Fixtures shared by the integration tests.
#![allow(dead_code)]

#[path = "../../src/test/image.rs"]
mod image;

pub use image::*;

use pescope::prelude::*;

/// Builds the image and opens it from memory.
pub fn open(image: &TestImage) -> PeFile {
    PeFile::from_mem(image.build()).expect("synthetic image is never empty")
}

/// A PE32+ image with one of each directory the readers cover.
///
/// ```text
/// 0x1000 .text   code, entry point
/// 0x2000 .idata  KERNEL32.DLL!ExitProcess, KERNEL32.DLL!#17, USER32.dll!MessageBoxW
/// 0x3000 .edata  sample.dll, three functions, two named
/// 0x4000 .rsrc   RT_VERSION/1/0x409 and RT_MANIFEST/1/0x409
/// 0x5000 .reloc  page 0x1000, offsets 0x004 and 0x010
/// ```
pub fn sample_image() -> TestImage {
    let imports = build_imports(
        0x2000,
        true,
        &[
            (
                "KERNEL32.DLL",
                &[ImportSpec::Name("ExitProcess", 0x120), ImportSpec::Ordinal(17)],
            ),
            ("USER32.dll", &[ImportSpec::Name("MessageBoxW", 7)]),
        ],
    );
    let exports = build_exports(
        0x3000,
        "sample.dll",
        1,
        &[0x1000, 0x1008, 0x1010],
        &[("Start", 0), ("Stop", 2)],
    );
    let version = build_version_info(
        (1, 2, 3, 4),
        &[("CompanyName", "Example Corp"), ("ProductName", "Sample")],
    );
    let resources = build_resources(
        0x4000,
        &[
            (ResKey::Id(16), ResKey::Id(1), ResKey::Id(0x409), version),
            (
                ResKey::Id(24),
                ResKey::Id(1),
                ResKey::Id(0x409),
                b"<assembly/>".to_vec(),
            ),
        ],
    );
    let relocs = build_relocs(&[(0x1000, &[(10, 0x004), (10, 0x010)])]);

    let (export_size, resource_size, reloc_size) = (
        exports.len() as u32,
        resources.len() as u32,
        relocs.len() as u32,
    );
    TestImage::new(true)
        .section(".text", 0x1000, vec![0xC3; 0x40])
        .section(".idata", 0x2000, imports.data)
        .section(".edata", 0x3000, exports)
        .section(".rsrc", 0x4000, resources)
        .section(".reloc", 0x5000, relocs)
        .entry_point(0x1000)
        .directory(dir::IMPORT, 0x2000, imports.directory_size)
        .directory(dir::EXPORT, 0x3000, export_size)
        .directory(dir::RESOURCE, 0x4000, resource_size)
        .directory(dir::BASERELOC, 0x5000, reloc_size)
}

/// [`sample_image`] with an attribute certificate table appended as overlay.
pub fn signed_image() -> TestImage {
    let blob = build_signed_data(&[0x33, 0x00, 0x12], "Example Root CA", "Example Publisher");
    let mut table = Vec::new();
    table.extend_from_slice(&(blob.len() as u32 + 8).to_le_bytes());
    table.extend_from_slice(&0x0200u16.to_le_bytes());
    table.extend_from_slice(&2u16.to_le_bytes());
    table.extend_from_slice(&blob);
    while table.len() % 8 != 0 {
        table.push(0);
    }

    let image = sample_image();
    let offset = image.build().len() as u32;
    let size = table.len() as u32;
    image.overlay(table).directory(dir::SECURITY, offset, size)
}
