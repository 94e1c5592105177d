use std::path::Path;

use serde::Serialize;

use crate::{
    commands::common::Session,
    output::{hex, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct Block {
    page_rva: u32,
    block_size: u32,
    entries: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct Entry {
    #[serde(rename = "type")]
    kind: u8,
    rva: u32,
}

/// `IMAGE_REL_BASED_*` name.
fn type_name(kind: u8) -> &'static str {
    match kind {
        0 => "ABSOLUTE",
        1 => "HIGH",
        2 => "LOW",
        3 => "HIGHLOW",
        4 => "HIGHADJ",
        10 => "DIR64",
        _ => "OTHER",
    }
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let blocks: Vec<Block> = pe
        .relocations()
        .into_iter()
        .map(|block| Block {
            page_rva: block.page_rva,
            block_size: block.block_size,
            entries: block
                .entries
                .iter()
                .map(|&(kind, offset)| Entry {
                    kind,
                    rva: block.page_rva.wrapping_add(u32::from(offset)),
                })
                .collect(),
        })
        .collect();
    session.warn_if_cancelled();

    print_output(&blocks, session.opts, |blocks| {
        let total: usize = blocks.iter().map(|block| block.entries.len()).sum();
        println!("{} blocks, {total} relocations", blocks.len());
        for block in blocks {
            println!(
                "\nPage {}  size {}  ({} entries)",
                hex(u64::from(block.page_rva)),
                hex(u64::from(block.block_size)),
                block.entries.len()
            );
            let mut tw = TabWriter::new(&[("RVA", Align::Right), ("Type", Align::Left)]).indent("  ");
            for entry in &block.entries {
                tw.row(vec![hex(u64::from(entry.rva)), type_name(entry.kind).to_string()]);
            }
            tw.print();
        }
    })
}
