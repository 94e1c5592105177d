use std::path::Path;

use anyhow::Context;
use pescope::{format::machine_name, DataDirectoryType};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::{
    commands::common::{timestamp, Session},
    output::{hex, print_fields, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub machine: String,
    pub bitness: String,
    pub kind: &'static str,
    pub subsystem: u16,
    pub characteristics: String,
    pub dll_characteristics: String,
    pub time_date_stamp: u32,
    pub image_base: u64,
    pub entry_point: u64,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub file_size: u64,
    pub checksum: u32,
    pub managed: bool,
    pub sections: Vec<SectionInfo>,
    pub directories: Vec<DirectoryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub version_strings: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
pub struct SectionInfo {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub raw_offset: u32,
    pub raw_size: u32,
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct DirectoryInfo {
    pub name: String,
    pub address: u32,
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct OverlayInfo {
    pub offset: u64,
    pub size: u64,
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;
    let headers = pe.headers().context("image has no headers")?;
    let map = pe.map();

    let sections = pe
        .sections()
        .iter()
        .map(|section| SectionInfo {
            name: section.name_str(),
            virtual_address: section.virtual_address,
            virtual_size: section.virtual_size,
            raw_offset: section.pointer_to_raw_data,
            raw_size: section.size_of_raw_data,
            access: section.characteristics.rwx(),
        })
        .collect();

    let directories = DataDirectoryType::iter()
        .filter_map(|kind| {
            pe.data_directory(kind).map(|directory| DirectoryInfo {
                name: kind.to_string(),
                address: directory.virtual_address,
                size: directory.size,
            })
        })
        .collect();

    let version_strings = pe
        .version_info()
        .map(|info| {
            info.string_tables
                .into_iter()
                .flat_map(|table| table.entries)
                .collect()
        })
        .unwrap_or_default();

    let info = ImageInfo {
        machine: machine_name(headers.file.machine).to_string(),
        bitness: map.bitness.to_string(),
        kind: if headers.file.is_dll() { "DLL" } else { "EXE" },
        subsystem: headers.optional.subsystem,
        characteristics: format!("0x{:04x}", headers.file.characteristics),
        dll_characteristics: format!("0x{:04x}", headers.optional.dll_characteristics),
        time_date_stamp: headers.file.time_date_stamp,
        image_base: headers.optional.image_base,
        entry_point: map.entry_point_address,
        size_of_image: headers.optional.size_of_image,
        size_of_headers: headers.optional.size_of_headers,
        file_size: map.binary_size,
        checksum: headers.optional.checksum,
        managed: pe.is_dotnet(),
        sections,
        directories,
        overlay: map.overlay().and_then(|region| {
            Some(OverlayInfo {
                offset: region.file_offset?,
                size: region.size,
            })
        }),
        version_strings,
    };

    print_output(&info, session.opts, |info| {
        print_fields(&[
            ("Machine", format!("{} ({})", info.machine, info.bitness)),
            ("Type", info.kind.to_string()),
            ("Subsystem", info.subsystem.to_string()),
            ("Characteristics", info.characteristics.clone()),
            ("DLL characteristics", info.dll_characteristics.clone()),
            ("Timestamp", timestamp(info.time_date_stamp)),
            ("Image base", hex(info.image_base)),
            ("Entry point", hex(info.entry_point)),
            ("Size of image", hex(u64::from(info.size_of_image))),
            ("Size of headers", hex(u64::from(info.size_of_headers))),
            ("File size", hex(info.file_size)),
            ("Checksum", format!("0x{:08x}", info.checksum)),
            ("Managed", info.managed.to_string()),
        ]);
        if let Some(overlay) = &info.overlay {
            print_fields(&[(
                "Overlay",
                format!("{} bytes at {}", overlay.size, hex(overlay.offset)),
            )]);
        }

        println!("\nSections ({}):", info.sections.len());
        let mut tw = TabWriter::new(&[
            ("Name", Align::Left),
            ("VirtAddr", Align::Right),
            ("VirtSize", Align::Right),
            ("RawOffset", Align::Right),
            ("RawSize", Align::Right),
            ("Access", Align::Left),
        ])
        .indent("  ");
        for section in &info.sections {
            tw.row(vec![
                section.name.clone(),
                hex(u64::from(section.virtual_address)),
                hex(u64::from(section.virtual_size)),
                hex(u64::from(section.raw_offset)),
                hex(u64::from(section.raw_size)),
                section.access.clone(),
            ]);
        }
        tw.print();

        println!("\nData directories:");
        let mut tw = TabWriter::new(&[
            ("Directory", Align::Left),
            ("Address", Align::Right),
            ("Size", Align::Right),
        ])
        .indent("  ");
        for directory in &info.directories {
            tw.row(vec![
                directory.name.clone(),
                hex(u64::from(directory.address)),
                hex(u64::from(directory.size)),
            ]);
        }
        tw.print();

        if !info.version_strings.is_empty() {
            println!("\nVersion:");
            for (key, value) in &info.version_strings {
                println!("  {key}: {value}");
            }
        }
    })
}
