use std::path::Path;

use serde::Serialize;

use crate::{
    commands::common::Session,
    output::{hex, print_fields, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct Stream {
    name: String,
    offset: u32,
    size: u32,
}

#[derive(Debug, Serialize)]
struct Table {
    name: String,
    rows: u32,
    row_size: u32,
}

#[derive(Debug, Serialize)]
struct DotnetOutput {
    runtime_version: String,
    metadata_version: String,
    flags: String,
    entry_point_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assembly: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mvid: Option<String>,
    streams: Vec<Stream>,
    tables: Vec<Table>,
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let Some(metadata) = pe.dotnet() else {
        if session.opts.json {
            println!("null");
        } else {
            println!("Not a managed image.");
        }
        return Ok(());
    };

    let tables = metadata
        .tables()
        .map(|tables| {
            tables
                .table_summary()
                .into_iter()
                .map(|summary| Table {
                    name: summary.table_id.to_string(),
                    rows: summary.row_count,
                    row_size: tables.row_size(summary.table_id),
                })
                .collect()
        })
        .unwrap_or_default();

    let output = DotnetOutput {
        runtime_version: metadata.header.runtime_version(),
        metadata_version: metadata.root.version.clone(),
        flags: format!("{:?}", metadata.header.flags),
        entry_point_token: format!("0x{:08x}", metadata.header.entry_point_token),
        module: metadata.module_name(),
        assembly: metadata.assembly_name(),
        mvid: metadata.mvid().map(|guid| guid.to_string()),
        streams: metadata
            .root
            .streams
            .iter()
            .map(|stream| Stream {
                name: stream.name.clone(),
                offset: stream.offset,
                size: stream.size,
            })
            .collect(),
        tables,
    };

    print_output(&output, session.opts, |out| {
        let mut fields = vec![
            ("Runtime", out.runtime_version.clone()),
            ("Metadata version", out.metadata_version.clone()),
            ("Flags", out.flags.clone()),
            ("Entry point token", out.entry_point_token.clone()),
        ];
        if let Some(module) = &out.module {
            fields.push(("Module", module.clone()));
        }
        if let Some(assembly) = &out.assembly {
            fields.push(("Assembly", assembly.clone()));
        }
        if let Some(mvid) = &out.mvid {
            fields.push(("MVID", mvid.clone()));
        }
        print_fields(&fields);

        println!("\nStreams:");
        let mut tw = TabWriter::new(&[
            ("Name", Align::Left),
            ("Offset", Align::Right),
            ("Size", Align::Right),
        ])
        .indent("  ");
        for stream in &out.streams {
            tw.row(vec![
                stream.name.clone(),
                hex(u64::from(stream.offset)),
                hex(u64::from(stream.size)),
            ]);
        }
        tw.print();

        println!("\nTables:");
        let mut tw = TabWriter::new(&[
            ("Table", Align::Left),
            ("Rows", Align::Right),
            ("RowSize", Align::Right),
        ])
        .indent("  ");
        for table in &out.tables {
            tw.row(vec![
                table.name.clone(),
                table.rows.to_string(),
                table.row_size.to_string(),
            ]);
        }
        tw.print();
    })
}
