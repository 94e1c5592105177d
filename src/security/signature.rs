//! Signer details from a PKCS#7 `SignedData` blob.
//!
//! ```text
//! ContentInfo ::= SEQUENCE {
//!     contentType   OID signedData,
//!     content   [0] SEQUENCE {
//!         version            INTEGER,
//!         digestAlgorithms   SET OF AlgorithmIdentifier,
//!         contentInfo        SEQUENCE { contentType OID, ... },
//!         certificates   [0] Certificate* OPTIONAL,
//!         crls           [1] ... OPTIONAL,
//!         signerInfos        SET OF SignerInfo } }
//!
//! SignerInfo ::= SEQUENCE {
//!     version, issuerAndSerialNumber SEQUENCE { Name, INTEGER },
//!     digestAlgorithm, ... }
//! ```
//!
//! Nothing is verified. The subject comes from the embedded certificate whose issuer and serial
//! match the signer.

use crate::{
    security::{
        asn1::{decode_string, get_cert_record, CertRecord, TAG_CONTEXT_0, TAG_SEQUENCE, TAG_SET},
        oid::{attribute_key, oid_name},
    },
    Result,
};

/// OID of PKCS#7 `signedData`.
pub const OID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";

/// What an Authenticode signature says about its signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    /// Type of the signed content, `SPC_INDIRECT_DATA` for Authenticode
    pub content_type: String,
    /// Digest algorithm OID of the first signer
    pub digest_algorithm: Option<String>,
    /// Serial number of the signing certificate in upper-case hex
    pub serial: String,
    /// Issuer of the signing certificate, e.g. `C=US, O=Example CA`
    pub issuer: String,
    /// Subject of the signing certificate if it is embedded
    pub subject: Option<String>,
    /// Number of embedded certificates
    pub certificate_count: usize,
}

impl SignatureInfo {
    /// Extracts the signer details from DER-encoded `ContentInfo`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob is not `SignedData` or lacks a
    /// signer, and [`crate::Error::RecursionLimit`] for nesting deeper than `max_depth`.
    pub fn parse(data: &[u8], max_depth: usize) -> Result<SignatureInfo> {
        let root = get_cert_record(data, 0, max_depth)?;
        if root.child(0).and_then(CertRecord::oid) != Some(OID_SIGNED_DATA) {
            return Err(malformed_error!("content is not PKCS#7 signedData"));
        }

        let signed = root
            .find(TAG_CONTEXT_0)
            .and_then(|content| content.child(0))
            .ok_or_else(|| malformed_error!("signedData without content"))?;

        let content_type = signed
            .find(TAG_SEQUENCE)
            .and_then(|info| info.child(0))
            .and_then(CertRecord::oid)
            .unwrap_or_default()
            .to_string();

        let signer = signed
            .children()
            .iter()
            .rev()
            .find(|child| child.tag.tag == TAG_SET)
            .and_then(|infos| infos.child(0))
            .ok_or_else(|| malformed_error!("signedData without signer"))?;
        let issuer_and_serial = signer
            .child(1)
            .ok_or_else(|| malformed_error!("signer without issuerAndSerialNumber"))?;
        let issuer = issuer_and_serial
            .child(0)
            .ok_or_else(|| malformed_error!("signer without issuer"))?;
        let serial = issuer_and_serial
            .child(1)
            .and_then(CertRecord::integer)
            .ok_or_else(|| malformed_error!("signer without serial number"))?;

        let digest_algorithm = signer
            .child(2)
            .and_then(|algorithm| algorithm.child(0))
            .and_then(CertRecord::oid)
            .or_else(|| {
                signed
                    .find(TAG_SET)
                    .and_then(|set| set.child(0))
                    .and_then(|algorithm| algorithm.child(0))
                    .and_then(CertRecord::oid)
            })
            .map(str::to_string);

        let certificates = signed
            .children()
            .iter()
            .skip(1)
            .find(|child| child.tag.tag == TAG_CONTEXT_0)
            .map_or(&[][..], CertRecord::children);
        let subject = certificates
            .iter()
            .find_map(|certificate| signer_subject(data, certificate, issuer, serial));

        Ok(SignatureInfo {
            content_type,
            digest_algorithm,
            serial: serial.iter().map(|byte| format!("{byte:02X}")).collect(),
            issuer: format_name(data, issuer),
            subject,
            certificate_count: certificates.len(),
        })
    }

    /// Name of the digest algorithm, e.g. `sha256`.
    #[must_use]
    pub fn digest_name(&self) -> Option<&'static str> {
        self.digest_algorithm.as_deref().and_then(oid_name)
    }
}

/// Subject of `certificate` if its issuer and serial are the signer's.
fn signer_subject(
    data: &[u8],
    certificate: &CertRecord,
    issuer: &CertRecord,
    serial: &[u8],
) -> Option<String> {
    let tbs = certificate.child(0)?;
    // explicit [0] version is optional
    let first = usize::from(tbs.child(0)?.tag.tag == TAG_CONTEXT_0);

    let own_serial = tbs.child(first)?.integer()?;
    let own_issuer = tbs.child(first + 2)?;
    if own_serial != serial || own_issuer.tag.content(data) != issuer.tag.content(data) {
        return None;
    }
    Some(format_name(data, tbs.child(first + 4)?))
}

/// Renders an X.501 `Name` as `KEY=value` pairs.
#[must_use]
pub fn format_name(data: &[u8], name: &CertRecord) -> String {
    let mut parts = Vec::new();
    for rdn in name.children() {
        for attribute in rdn.children() {
            let (Some(oid), Some(value)) = (
                attribute.child(0).and_then(CertRecord::oid),
                attribute.child(1),
            ) else {
                continue;
            };
            let key = attribute_key(oid).unwrap_or(oid);
            let text = decode_string(value.tag.tag, value.tag.content(data));
            parts.push(format!("{key}={text}"));
        }
    }
    parts.join(", ")
}
