use std::path::Path;

use pescope::{security::oid_name, PeFile};
use serde::Serialize;

use crate::{
    commands::common::Session,
    output::{hex, print_fields, print_output},
};

#[derive(Debug, Serialize)]
struct Signer {
    content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
    serial: String,
    issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    certificates: usize,
}

#[derive(Debug, Serialize)]
struct CertEntry {
    offset: u64,
    length: u32,
    revision: u16,
    certificate_type: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    signer: Option<Signer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn describe(pe: &PeFile) -> Vec<CertEntry> {
    let max_depth = pe.options().limits.max_cert_depth;
    pe.certificates()
        .iter()
        .map(|certificate| {
            let (signer, error) = if certificate.is_authenticode() {
                match certificate.signature(max_depth) {
                    Ok(info) => (
                        Some(Signer {
                            content_type: oid_name(&info.content_type)
                                .map_or_else(|| info.content_type.clone(), str::to_string),
                            digest: info
                                .digest_name()
                                .map(str::to_string)
                                .or_else(|| info.digest_algorithm.clone()),
                            serial: info.serial,
                            issuer: info.issuer,
                            subject: info.subject,
                            certificates: info.certificate_count,
                        }),
                        None,
                    ),
                    Err(error) => (None, Some(error.to_string())),
                }
            } else {
                (None, None)
            };

            CertEntry {
                offset: certificate.offset,
                length: certificate.length,
                revision: certificate.revision,
                certificate_type: certificate.certificate_type,
                signer,
                error,
            }
        })
        .collect()
}

pub fn run(path: &Path, session: &Session) -> anyhow::Result<()> {
    let pe = session.open(path)?;
    let entries = describe(&pe);
    session.warn_if_cancelled();

    print_output(&entries, session.opts, |entries| {
        if entries.is_empty() {
            println!("No attribute certificates.");
        }
        for (index, entry) in entries.iter().enumerate() {
            println!(
                "Certificate {index} at {}  ({} bytes, revision 0x{:04x}, type {})",
                hex(entry.offset),
                entry.length,
                entry.revision,
                entry.certificate_type
            );
            if let Some(signer) = &entry.signer {
                let mut fields = vec![
                    ("  Content", signer.content_type.clone()),
                    ("  Digest", signer.digest.clone().unwrap_or_else(|| "-".into())),
                    ("  Serial", signer.serial.clone()),
                    ("  Issuer", signer.issuer.clone()),
                ];
                if let Some(subject) = &signer.subject {
                    fields.push(("  Subject", subject.clone()));
                }
                fields.push(("  Embedded certs", signer.certificates.to_string()));
                print_fields(&fields);
            }
            if let Some(error) = &entry.error {
                println!("  not decoded: {error}");
            }
        }
    })
}
