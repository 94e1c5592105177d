use std::path::Path;

use serde::Serialize;

use crate::{
    commands::common::Session,
    output::{hex, print_fields, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct ExportEntry {
    ordinal: u32,
    rva: u32,
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forwarder: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportsOutput {
    dll_name: String,
    base: u32,
    number_of_functions: u32,
    number_of_names: u32,
    exports: Vec<ExportEntry>,
}

pub fn run(path: &Path, all: bool, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let Some(header) = pe.exports(!all) else {
        if session.opts.json {
            println!("null");
        } else {
            println!("No export directory.");
        }
        return Ok(());
    };
    session.warn_if_cancelled();

    let output = ExportsOutput {
        dll_name: header.dll_name,
        base: header.base,
        number_of_functions: header.number_of_functions,
        number_of_names: header.number_of_names,
        exports: header
            .positions
            .into_iter()
            .map(|position| ExportEntry {
                ordinal: position.ordinal,
                rva: position.rva,
                name: position.name,
                aliases: position.aliases,
                forwarder: position.forwarder,
            })
            .collect(),
    };

    print_output(&output, session.opts, |out| {
        print_fields(&[
            ("DLL name", out.dll_name.clone()),
            ("Ordinal base", out.base.to_string()),
            ("Functions", out.number_of_functions.to_string()),
            ("Names", out.number_of_names.to_string()),
        ]);
        println!();

        let mut tw = TabWriter::new(&[
            ("Ordinal", Align::Right),
            ("RVA", Align::Right),
            ("Name", Align::Left),
        ]);
        for export in &out.exports {
            let mut name = if export.name.is_empty() {
                "<ordinal-only>".to_string()
            } else {
                export.name.clone()
            };
            if !export.aliases.is_empty() {
                name = format!("{name} (aka {})", export.aliases.join(", "));
            }
            let name = match &export.forwarder {
                Some(target) => format!("{name} -> {target}"),
                None => name,
            };
            tw.row(vec![export.ordinal.to_string(), hex(u64::from(export.rva)), name]);
        }
        tw.print();
    })
}
