use std::path::Path;

use serde::Serialize;

use crate::{
    commands::common::Session,
    output::{hex, print_fields, print_output},
};

#[derive(Debug, Serialize)]
struct TlsOutput {
    start_address_of_raw_data: u64,
    end_address_of_raw_data: u64,
    address_of_index: u64,
    address_of_callbacks: u64,
    size_of_zero_fill: u32,
    characteristics: u32,
    callbacks: Vec<u64>,
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;

    let Some(tls) = pe.tls_directory() else {
        if session.opts.json {
            println!("null");
        } else {
            println!("No TLS directory.");
        }
        return Ok(());
    };
    session.warn_if_cancelled();

    let output = TlsOutput {
        start_address_of_raw_data: tls.start_address_of_raw_data(),
        end_address_of_raw_data: tls.end_address_of_raw_data(),
        address_of_index: tls.address_of_index(),
        address_of_callbacks: tls.address_of_callbacks(),
        size_of_zero_fill: tls.size_of_zero_fill(),
        characteristics: tls.characteristics(),
        callbacks: tls.callbacks,
    };

    print_output(&output, session.opts, |out| {
        print_fields(&[
            (
                "Raw data",
                format!(
                    "{} .. {}",
                    hex(out.start_address_of_raw_data),
                    hex(out.end_address_of_raw_data)
                ),
            ),
            ("Index slot", hex(out.address_of_index)),
            ("Callback array", hex(out.address_of_callbacks)),
            ("Zero fill", out.size_of_zero_fill.to_string()),
            ("Characteristics", format!("0x{:08x}", out.characteristics)),
        ]);
        println!("\nCallbacks ({}):", out.callbacks.len());
        for callback in &out.callbacks {
            println!("  {}", hex(*callback));
        }
    })
}
