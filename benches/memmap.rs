#![allow(dead_code)]
extern crate pescope;

#[path = "../src/test/image.rs"]
mod image;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use image::{build_imports, build_relocs, dir, ImportSpec, TestImage};
use pescope::{MapMode, PeFile};
use std::hint::black_box;

/// An image with many sections, a relocation table covering every page and a few imports.
fn synthetic() -> Vec<u8> {
    let mut image = TestImage::new(true).size_of_headers(0x800);
    for index in 0..32u32 {
        image = image.section(&format!(".s{index}"), 0x1000 * (index + 1), vec![0x90; 0x800]);
    }

    let imports = build_imports(
        0x21000,
        true,
        &[
            (
                "KERNEL32.DLL",
                &[
                    ImportSpec::Name("ExitProcess", 0),
                    ImportSpec::Name("GetLastError", 1),
                    ImportSpec::Ordinal(17),
                ],
            ),
            ("USER32.dll", &[ImportSpec::Name("MessageBoxW", 2)]),
        ],
    );
    let pages: Vec<(u32, Vec<(u8, u16)>)> = (1..=32u32)
        .map(|page| (page * 0x1000, (0..64u16).map(|i| (10u8, i * 8)).collect()))
        .collect();
    let blocks: Vec<(u32, &[(u8, u16)])> = pages
        .iter()
        .map(|(page, entries)| (*page, entries.as_slice()))
        .collect();
    let relocs = build_relocs(&blocks);
    let relocs_size = relocs.len() as u32;

    image
        .section(".idata", 0x21000, imports.data)
        .section(".reloc", 0x22000, relocs)
        .directory(dir::IMPORT, 0x21000, imports.directory_size)
        .directory(dir::BASERELOC, 0x22000, relocs_size)
        .build()
}

/// Map construction and address translation, the hot path of every reader.
fn bench_memory_map(c: &mut Criterion) {
    let data = synthetic();
    let pe = PeFile::from_mem(data.clone()).unwrap();

    let mut group = c.benchmark_group("memmap");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("parse_headers", |b| {
        b.iter(|| black_box(PeFile::from_mem(black_box(data.clone())).unwrap()));
    });
    group.bench_function("build_file_map", |b| {
        b.iter(|| black_box(pe.memory_map(MapMode::File)));
    });

    let map = pe.map();
    group.bench_function("translate_rvas", |b| {
        b.iter(|| {
            let mut hits = 0u64;
            for rva in (0x1000..0x21000u64).step_by(0x100) {
                if let Some(offset) = map.rel_address_to_offset(black_box(rva)) {
                    hits += offset;
                }
            }
            black_box(hits)
        });
    });
    group.finish();
}

/// Directory walkers over the same image.
fn bench_walkers(c: &mut Criterion) {
    let pe = PeFile::from_mem(synthetic()).unwrap();

    let mut group = c.benchmark_group("walkers");
    group.bench_function("imports", |b| b.iter(|| black_box(pe.imports())));
    group.bench_function("relocations", |b| b.iter(|| black_box(pe.relocs_as_rva_list())));
    group.bench_function("checksum", |b| b.iter(|| black_box(pe.compute_checksum())));
    group.finish();
}

criterion_group!(benches, bench_memory_map, bench_walkers);
criterion_main!(benches);
