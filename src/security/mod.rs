//! Authenticode certificate table and the DER reader behind it.
//!
//! [`PeFile::certificates`](crate::PeFile::certificates) walks the `WIN_CERTIFICATE` entries of
//! the Security directory. PKCS#7 entries can be taken apart with [`get_cert_record`] or
//! summarised with [`SignatureInfo`]. No signature is verified and no certificate chain is
//! validated.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::PeFile;
//!
//! let pe = PeFile::from_file("signed.exe".as_ref())?;
//! for signature in pe.signatures() {
//!     println!("{} serial {}", signature.issuer, signature.serial);
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

pub mod asn1;
mod oid;
mod signature;
mod wincert;

pub use asn1::{get_cert_record, read_cert_tag, CertRecord, CertTag, CertValue};
pub use oid::{attribute_key, oid_name};
pub use signature::{format_name, SignatureInfo, OID_SIGNED_DATA};
pub use wincert::WinCertificate;
