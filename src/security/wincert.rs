//! Attribute certificate table.
//!
//! The Security data directory is the one directory whose address is a file offset. It holds
//! `WIN_CERTIFICATE` entries, each 8-byte aligned:
//!
//! ```text
//! +0  dwLength          entry size including this header
//! +4  wRevision         0x0100 or 0x0200
//! +6  wCertificateType  1 = X.509, 2 = PKCS#7 SignedData
//! +8  bCertificate
//! ```

use crate::{
    pe::{
        constants::{
            WIN_CERTIFICATE_HEADER_SIZE as WIN_CERTIFICATE_HEADER, WIN_CERT_REVISION_1_0,
            WIN_CERT_REVISION_2_0, WIN_CERT_TYPE_PKCS_SIGNED_DATA,
        },
        DataDirectoryType, PeFile,
    },
    security::signature::SignatureInfo,
    utils::align_up,
    Result,
};

/// One entry of the attribute certificate table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinCertificate {
    /// File offset of the entry header
    pub offset: u64,
    /// `dwLength`
    pub length: u32,
    /// `wRevision`
    pub revision: u16,
    /// `wCertificateType`
    pub certificate_type: u16,
    /// `bCertificate`
    pub data: Vec<u8>,
}

impl WinCertificate {
    /// Returns `true` for PKCS#7 entries, the Authenticode form.
    #[must_use]
    pub fn is_authenticode(&self) -> bool {
        self.certificate_type == WIN_CERT_TYPE_PKCS_SIGNED_DATA
    }

    /// Signer details of a PKCS#7 entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for other certificate types and the errors of
    /// [`SignatureInfo::parse`].
    pub fn signature(&self, max_depth: usize) -> Result<SignatureInfo> {
        if !self.is_authenticode() {
            return Err(crate::Error::NotSupported);
        }
        SignatureInfo::parse(&self.data, max_depth)
    }
}

impl PeFile {
    /// Walks the attribute certificate table.
    ///
    /// The walk stops at the first entry that is shorter than its header or runs past the
    /// directory or the file.
    #[must_use]
    pub fn certificates(&self) -> Vec<WinCertificate> {
        let Some(directory) = self.data_directory(DataDirectoryType::Security) else {
            return Vec::new();
        };
        let file = self.file();
        let start = u64::from(directory.virtual_address);
        let end = (start + u64::from(directory.size)).min(file.len() as u64);

        let mut certificates = Vec::new();
        let mut offset = start;
        while offset + WIN_CERTIFICATE_HEADER <= end {
            if self.is_cancelled() {
                break;
            }

            let (Ok(length), Ok(revision), Ok(certificate_type)) = (
                file.read_u32(offset, false),
                file.read_u16(offset + 4, false),
                file.read_u16(offset + 6, false),
            ) else {
                break;
            };
            if u64::from(length) < WIN_CERTIFICATE_HEADER || offset + u64::from(length) > end {
                log::debug!("certificate entry at 0x{offset:x} has bad length 0x{length:x}");
                break;
            }

            let size = (u64::from(length) - WIN_CERTIFICATE_HEADER) as usize;
            let Ok(data) = file.read_array(offset + WIN_CERTIFICATE_HEADER, size) else {
                break;
            };
            if revision != WIN_CERT_REVISION_1_0 && revision != WIN_CERT_REVISION_2_0 {
                log::debug!("certificate entry at 0x{offset:x} has revision 0x{revision:04x}");
            }

            certificates.push(WinCertificate {
                offset,
                length,
                revision,
                certificate_type,
                data: data.to_vec(),
            });
            offset = align_up(offset + u64::from(length), 8);
        }

        certificates
    }

    /// Signer details of every Authenticode entry that decodes.
    #[must_use]
    pub fn signatures(&self) -> Vec<SignatureInfo> {
        let max_depth = self.options().limits.max_cert_depth;
        self.certificates()
            .iter()
            .filter(|certificate| certificate.is_authenticode())
            .filter_map(|certificate| match certificate.signature(max_depth) {
                Ok(info) => Some(info),
                Err(error) => {
                    log::warn!(
                        "signature at 0x{:x} rejected: {error}",
                        certificate.offset
                    );
                    None
                }
            })
            .collect()
    }
}
