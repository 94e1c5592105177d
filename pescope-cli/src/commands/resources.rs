use std::path::Path;

use pescope::pe::resources::ResourceName;
use serde::Serialize;

use crate::{
    commands::common::Session,
    output::{hex, hex_opt, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct ResourceEntry {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    language: String,
    data_rva: u32,
    file_offset: Option<u64>,
    size: u32,
    code_page: u32,
}

/// Well-known `RT_*` identifiers.
fn type_label(name: &ResourceName) -> String {
    let ResourceName::Id(id) = name else {
        return name.to_string();
    };
    let label = match id {
        1 => "CURSOR",
        2 => "BITMAP",
        3 => "ICON",
        4 => "MENU",
        5 => "DIALOG",
        6 => "STRING",
        7 => "FONTDIR",
        8 => "FONT",
        9 => "ACCELERATOR",
        10 => "RCDATA",
        11 => "MESSAGETABLE",
        12 => "GROUP_CURSOR",
        14 => "GROUP_ICON",
        16 => "VERSION",
        17 => "DLGINCLUDE",
        19 => "PLUGPLAY",
        20 => "VXD",
        21 => "ANICURSOR",
        22 => "ANIICON",
        23 => "HTML",
        24 => "MANIFEST",
        _ => return name.to_string(),
    };
    format!("{label} ({name})")
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let entries: Vec<ResourceEntry> = pe
        .resources()
        .into_iter()
        .map(|record| {
            let [kind, name, language] = &record.ids;
            ResourceEntry {
                kind: type_label(kind),
                name: name.to_string(),
                language: language.to_string(),
                data_rva: record.data_rva,
                file_offset: record.data_offset,
                size: record.size,
                code_page: record.code_page,
            }
        })
        .collect();
    session.warn_if_cancelled();

    print_output(&entries, session.opts, |entries| {
        println!("Resources ({} leaves):", entries.len());
        let mut tw = TabWriter::new(&[
            ("Type", Align::Left),
            ("Name", Align::Left),
            ("Lang", Align::Left),
            ("RVA", Align::Right),
            ("Offset", Align::Right),
            ("Size", Align::Right),
        ])
        .indent("  ");
        for entry in entries {
            tw.row(vec![
                entry.kind.clone(),
                entry.name.clone(),
                entry.language.clone(),
                hex(u64::from(entry.data_rva)),
                hex_opt(entry.file_offset),
                entry.size.to_string(),
            ]);
        }
        tw.print();
    })
}
