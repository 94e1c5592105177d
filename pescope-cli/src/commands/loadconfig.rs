use std::path::Path;

use serde::Serialize;

use crate::{
    commands::common::Session,
    output::{hex, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct LoadConfigOutput {
    size: u32,
    fields: Vec<(&'static str, u64)>,
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let Some(config) = pe.load_config() else {
        if session.opts.json {
            println!("null");
        } else {
            println!("No load configuration directory.");
        }
        return Ok(());
    };

    let output = LoadConfigOutput {
        size: config.size(),
        fields: config.present_fields().collect(),
    };

    print_output(&output, session.opts, |out| {
        println!("Load configuration ({} bytes declared):", out.size);
        let mut tw = TabWriter::new(&[("Field", Align::Left), ("Value", Align::Right)]).indent("  ");
        for (name, value) in &out.fields {
            tw.row(vec![(*name).to_string(), hex(*value)]);
        }
        tw.print();
    })
}
