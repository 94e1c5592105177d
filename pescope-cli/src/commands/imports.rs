use std::path::Path;

use pescope::pe::imports::ImportPosition;
use serde::Serialize;

use crate::{
    commands::common::{timestamp, Session},
    output::{hex, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct Symbol {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ordinal: Option<u64>,
    hint: u16,
    thunk_rva: u64,
}

impl From<&ImportPosition> for Symbol {
    fn from(position: &ImportPosition) -> Self {
        Symbol {
            name: position.name.clone(),
            ordinal: position.ordinal,
            hint: position.hint,
            thunk_rva: position.thunk_rva,
        }
    }
}

#[derive(Debug, Serialize)]
struct Library {
    name: String,
    delayed: bool,
    first_thunk: u32,
    symbols: Vec<Symbol>,
}

#[derive(Debug, Serialize)]
struct BoundModule {
    name: String,
    time_date_stamp: u32,
    forwarders: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ImportsOutput {
    libraries: Vec<Library>,
    bound: Vec<BoundModule>,
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let mut libraries: Vec<Library> = pe
        .imports()
        .iter()
        .map(|header| Library {
            name: header.library_name.clone(),
            delayed: false,
            first_thunk: header.first_thunk,
            symbols: header.positions.iter().map(Symbol::from).collect(),
        })
        .collect();
    libraries.extend(pe.delay_imports().iter().map(|descriptor| Library {
        name: descriptor.library_name.clone(),
        delayed: true,
        first_thunk: descriptor.import_address_table_rva,
        symbols: descriptor.positions.iter().map(Symbol::from).collect(),
    }));

    let bound = pe
        .bound_imports()
        .into_iter()
        .map(|descriptor| BoundModule {
            name: descriptor.module_name,
            time_date_stamp: descriptor.time_date_stamp,
            forwarders: descriptor
                .forwarders
                .into_iter()
                .map(|forwarder| forwarder.module_name)
                .collect(),
        })
        .collect();
    session.warn_if_cancelled();

    let output = ImportsOutput { libraries, bound };
    print_output(&output, session.opts, |out| {
        if out.libraries.is_empty() {
            println!("No imports.");
        }
        for library in &out.libraries {
            let label = if library.delayed { " (delay-load)" } else { "" };
            println!(
                "{}{label}  IAT {}  ({} symbols)",
                library.name,
                hex(u64::from(library.first_thunk)),
                library.symbols.len()
            );
            let mut tw = TabWriter::new(&[
                ("Thunk", Align::Right),
                ("Hint", Align::Right),
                ("Name", Align::Left),
            ])
            .indent("  ");
            for symbol in &library.symbols {
                let name = match symbol.ordinal {
                    Some(ordinal) => format!("#{ordinal}"),
                    None => symbol.name.clone(),
                };
                tw.row(vec![hex(symbol.thunk_rva), symbol.hint.to_string(), name]);
            }
            tw.print();
            println!();
        }

        if !out.bound.is_empty() {
            println!("Bound imports:");
            let mut tw = TabWriter::new(&[
                ("Module", Align::Left),
                ("Timestamp", Align::Left),
                ("Forwarders", Align::Left),
            ])
            .indent("  ");
            for module in &out.bound {
                tw.row(vec![
                    module.name.clone(),
                    timestamp(module.time_date_stamp),
                    module.forwarders.join(", "),
                ]);
            }
            tw.print();
        }
    })
}
