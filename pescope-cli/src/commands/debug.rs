use std::path::Path;

use pescope::pe::debug::CodeView;
use serde::Serialize;

use crate::{
    commands::common::{timestamp, Session},
    output::{hex, print_fields, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct DebugEntry {
    #[serde(rename = "type")]
    kind: u32,
    type_name: &'static str,
    time_date_stamp: u32,
    size: u32,
    rva: u32,
    file_offset: u32,
}

#[derive(Debug, Serialize)]
struct PdbReference {
    format: &'static str,
    path: String,
    symbol_key: String,
}

#[derive(Debug, Serialize)]
struct DebugOutput {
    entries: Vec<DebugEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdb: Option<PdbReference>,
}

/// `IMAGE_DEBUG_TYPE_*` name.
fn type_name(kind: u32) -> &'static str {
    match kind {
        1 => "COFF",
        2 => "CODEVIEW",
        3 => "FPO",
        4 => "MISC",
        5 => "EXCEPTION",
        6 => "FIXUP",
        9 => "BORLAND",
        12 => "VC_FEATURE",
        13 => "POGO",
        14 => "ILTCG",
        16 => "REPRO",
        17 => "EMBEDDED_PORTABLE_PDB",
        19 => "PDB_CHECKSUM",
        20 => "EX_DLLCHARACTERISTICS",
        _ => "UNKNOWN",
    }
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let entries = pe
        .debug_directories()
        .into_iter()
        .map(|entry| DebugEntry {
            kind: entry.debug_type,
            type_name: type_name(entry.debug_type),
            time_date_stamp: entry.time_date_stamp,
            size: entry.size_of_data,
            rva: entry.address_of_raw_data,
            file_offset: entry.pointer_to_raw_data,
        })
        .collect();
    let pdb = pe.pdb_info().map(|codeview| PdbReference {
        format: match codeview {
            CodeView::Pdb70 { .. } => "RSDS",
            CodeView::Pdb20 { .. } => "NB10",
        },
        path: codeview.path().to_string(),
        symbol_key: codeview.symbol_key(),
    });

    let output = DebugOutput { entries, pdb };
    print_output(&output, session.opts, |out| {
        let mut tw = TabWriter::new(&[
            ("Type", Align::Left),
            ("Timestamp", Align::Left),
            ("Size", Align::Right),
            ("RVA", Align::Right),
            ("Offset", Align::Right),
        ]);
        for entry in &out.entries {
            tw.row(vec![
                format!("{} ({})", entry.type_name, entry.kind),
                timestamp(entry.time_date_stamp),
                entry.size.to_string(),
                hex(u64::from(entry.rva)),
                hex(u64::from(entry.file_offset)),
            ]);
        }
        tw.print();

        if let Some(pdb) = &out.pdb {
            println!();
            print_fields(&[
                ("PDB", pdb.path.clone()),
                ("Format", pdb.format.to_string()),
                ("Symbol key", pdb.symbol_key.clone()),
            ]);
        }
    })
}
