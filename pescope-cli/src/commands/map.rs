use std::path::Path;

use pescope::MapMode;
use serde::Serialize;

use crate::{
    commands::common::{image_options, Session},
    output::{hex, hex_opt, print_fields, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct RegionEntry {
    kind: String,
    name: String,
    file_offset: Option<u64>,
    virtual_address: Option<u64>,
    size: u64,
    virtual_only: bool,
}

#[derive(Debug, Serialize)]
struct MapOutput {
    mode: String,
    binary_size: u64,
    image_size: u64,
    module_base: u64,
    entry_point: u64,
    file_alignment: u32,
    section_alignment: u32,
    regions: Vec<RegionEntry>,
}

pub fn run(path: &Path, image: bool, session: &Session) -> anyhow::Result<()> {
    let pe = if image {
        session.open_with(path, image_options())?
    } else {
        session.open(path)?
    };
    let map = pe.memory_map(if image { MapMode::Image } else { MapMode::File });

    let output = MapOutput {
        mode: map.mode.to_string(),
        binary_size: map.binary_size,
        image_size: map.image_size,
        module_base: map.module_base_address,
        entry_point: map.entry_point_address,
        file_alignment: map.file_alignment,
        section_alignment: map.section_alignment,
        regions: map
            .regions
            .iter()
            .map(|region| RegionEntry {
                kind: region.kind.to_string(),
                name: region.name.clone(),
                file_offset: region.file_offset,
                virtual_address: region.virtual_address,
                size: region.size,
                virtual_only: region.is_virtual_only,
            })
            .collect(),
    };

    print_output(&output, session.opts, |out| {
        print_fields(&[
            ("Mode", out.mode.clone()),
            ("Binary size", hex(out.binary_size)),
            ("Image size", hex(out.image_size)),
            ("Module base", hex(out.module_base)),
            ("Entry point", hex(out.entry_point)),
            (
                "Alignment",
                format!(
                    "file {} / section {}",
                    hex(u64::from(out.file_alignment)),
                    hex(u64::from(out.section_alignment))
                ),
            ),
        ]);
        println!();

        let mut tw = TabWriter::new(&[
            ("Kind", Align::Left),
            ("Name", Align::Left),
            ("Offset", Align::Right),
            ("Address", Align::Right),
            ("Size", Align::Right),
            ("", Align::Left),
        ]);
        for region in &out.regions {
            tw.row(vec![
                region.kind.clone(),
                region.name.clone(),
                hex_opt(region.file_offset),
                hex_opt(region.virtual_address),
                hex(region.size),
                if region.virtual_only { "virtual" } else { "" }.to_string(),
            ]);
        }
        tw.print();
    })
}
