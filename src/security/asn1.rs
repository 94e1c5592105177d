//! Minimal DER walker.
//!
//! Enough of ASN.1 to take an Authenticode blob apart: tag and length decoding, recursion into
//! constructed values, and decoding of OBJECT IDENTIFIER and INTEGER leaves. Everything else
//! is kept as a span into the input.

use crate::{Error::RecursionLimit, Result};

/// `BOOLEAN`
pub const TAG_BOOLEAN: u8 = 0x01;
/// `INTEGER`
pub const TAG_INTEGER: u8 = 0x02;
/// `BIT STRING`
pub const TAG_BIT_STRING: u8 = 0x03;
/// `OCTET STRING`
pub const TAG_OCTET_STRING: u8 = 0x04;
/// `NULL`
pub const TAG_NULL: u8 = 0x05;
/// `OBJECT IDENTIFIER`
pub const TAG_OID: u8 = 0x06;
/// `UTF8String`
pub const TAG_UTF8_STRING: u8 = 0x0C;
/// `PrintableString`
pub const TAG_PRINTABLE_STRING: u8 = 0x13;
/// `T61String`
pub const TAG_T61_STRING: u8 = 0x14;
/// `IA5String`
pub const TAG_IA5_STRING: u8 = 0x16;
/// `UTCTime`
pub const TAG_UTC_TIME: u8 = 0x17;
/// `GeneralizedTime`
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
/// `BMPString`
pub const TAG_BMP_STRING: u8 = 0x1E;
/// `SEQUENCE`
pub const TAG_SEQUENCE: u8 = 0x30;
/// `SET`
pub const TAG_SET: u8 = 0x31;
/// Constructed bit of the identifier octet
pub const CONSTRUCTED: u8 = 0x20;
/// Context-specific class `[0]`, constructed
pub const TAG_CONTEXT_0: u8 = 0xA0;
/// Context-specific class `[1]`, constructed
pub const TAG_CONTEXT_1: u8 = 0xA1;

/// Low tag bits announcing a multi-byte tag number.
const HIGH_TAG_NUMBER: u8 = 0x1F;
/// Longest supported long-form length field.
const MAX_LENGTH_BYTES: usize = 4;
/// Longest OID sub-identifier, in bytes, that still fits a `u64`.
const MAX_ARC_BYTES: usize = 9;

/// Position of one DER value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertTag {
    /// Identifier octet
    pub tag: u8,
    /// Offset of the identifier octet
    pub offset: usize,
    /// Bytes taken by identifier and length
    pub header_size: usize,
    /// Length of the contents
    pub size: usize,
}

impl CertTag {
    /// Offset of the first content byte.
    #[must_use]
    pub fn content_offset(&self) -> usize {
        self.offset + self.header_size
    }

    /// Offset one past the last content byte.
    #[must_use]
    pub fn end(&self) -> usize {
        self.content_offset() + self.size
    }

    /// Returns `true` if the value nests further values.
    #[must_use]
    pub fn is_constructed(&self) -> bool {
        self.tag & CONSTRUCTED != 0
    }

    /// Content bytes within `data`, the buffer the tag was read from.
    #[must_use]
    pub fn content<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.content_offset()..self.end()).unwrap_or(&[])
    }
}

/// Reads the tag at `offset`.
///
/// Returns `None` if the tag differs from `expected_tag` (when given), uses the high tag
/// number form, has an indefinite or over-long length, or its contents run past `data`.
#[must_use]
pub fn read_cert_tag(data: &[u8], offset: usize, expected_tag: Option<u8>) -> Option<CertTag> {
    let tag = *data.get(offset)?;
    if expected_tag.is_some_and(|expected| expected != tag) {
        return None;
    }
    if tag & HIGH_TAG_NUMBER == HIGH_TAG_NUMBER {
        log::debug!("multi-byte DER tag at 0x{offset:x}");
        return None;
    }

    let first = *data.get(offset + 1)?;
    let (size, header_size) = if first & 0x80 == 0 {
        (usize::from(first), 2)
    } else {
        let count = usize::from(first & 0x7F);
        if count == 0 || count > MAX_LENGTH_BYTES {
            log::debug!("unsupported DER length form 0x{first:02x} at 0x{offset:x}");
            return None;
        }
        let bytes = data.get(offset + 2..offset + 2 + count)?;
        let size = bytes
            .iter()
            .fold(0usize, |acc, &byte| (acc << 8) | usize::from(byte));
        (size, 2 + count)
    };

    let cert_tag = CertTag {
        tag,
        offset,
        header_size,
        size,
    };
    if cert_tag.end() > data.len() {
        return None;
    }
    Some(cert_tag)
}

/// Decoded content of a DER value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertValue {
    /// Nested values in order
    Constructed(Vec<CertRecord>),
    /// OBJECT IDENTIFIER in dotted decimal
    ObjectId(String),
    /// INTEGER magnitude, big-endian without leading zero bytes
    Integer(Vec<u8>),
    /// Any other leaf; the bytes are [`CertTag::content`]
    Raw,
}

/// One node of a decoded DER tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertRecord {
    /// Where the value sits
    pub tag: CertTag,
    /// What it decodes to
    pub value: CertValue,
}

impl CertRecord {
    /// Nested values, empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[CertRecord] {
        match &self.value {
            CertValue::Constructed(children) => children,
            _ => &[],
        }
    }

    /// The `index`-th nested value.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&CertRecord> {
        self.children().get(index)
    }

    /// First nested value with identifier `tag`.
    #[must_use]
    pub fn find(&self, tag: u8) -> Option<&CertRecord> {
        self.children().iter().find(|child| child.tag.tag == tag)
    }

    /// Dotted OID if this is an OBJECT IDENTIFIER.
    #[must_use]
    pub fn oid(&self) -> Option<&str> {
        match &self.value {
            CertValue::ObjectId(oid) => Some(oid),
            _ => None,
        }
    }

    /// Magnitude bytes if this is an INTEGER.
    #[must_use]
    pub fn integer(&self) -> Option<&[u8]> {
        match &self.value {
            CertValue::Integer(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Decodes the value at `offset` and everything nested in it.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a tag cannot be read or a child overruns its
/// parent, and [`crate::Error::RecursionLimit`] when nesting exceeds `max_depth`.
pub fn get_cert_record(data: &[u8], offset: usize, max_depth: usize) -> Result<CertRecord> {
    read_record(data, offset, 0, max_depth)
}

fn read_record(data: &[u8], offset: usize, depth: usize, max_depth: usize) -> Result<CertRecord> {
    if depth > max_depth {
        return Err(RecursionLimit(max_depth));
    }
    let Some(tag) = read_cert_tag(data, offset, None) else {
        return Err(malformed_error!("unreadable DER value at 0x{:x}", offset));
    };

    let value = if tag.is_constructed() {
        let mut children = Vec::new();
        let mut position = tag.content_offset();
        while position < tag.end() {
            let child = read_record(data, position, depth + 1, max_depth)?;
            if child.tag.end() > tag.end() {
                return Err(malformed_error!(
                    "DER value at 0x{:x} overruns its parent",
                    position
                ));
            }
            position = child.tag.end();
            children.push(child);
        }
        CertValue::Constructed(children)
    } else {
        match tag.tag {
            TAG_OID => match decode_oid(tag.content(data)) {
                Some(oid) => CertValue::ObjectId(oid),
                None => CertValue::Raw,
            },
            TAG_INTEGER => CertValue::Integer(integer_magnitude(tag.content(data))),
            _ => CertValue::Raw,
        }
    };

    Ok(CertRecord { tag, value })
}

/// Dotted decimal form of OID content bytes.
///
/// Sub-identifiers use base-128 with the high bit marking continuation; the first one packs
/// the first two arcs as `40 * first + second`.
#[must_use]
pub fn decode_oid(content: &[u8]) -> Option<String> {
    if content.is_empty() {
        return None;
    }

    let mut arcs = Vec::new();
    let mut value = 0u64;
    let mut length = 0;
    for &byte in content {
        value = (value << 7) | u64::from(byte & 0x7F);
        length += 1;
        if length > MAX_ARC_BYTES {
            return None;
        }
        if byte & 0x80 == 0 {
            arcs.push(value);
            value = 0;
            length = 0;
        }
    }
    if length != 0 {
        return None;
    }

    let first = arcs[0];
    let (top, second) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };

    let mut oid = format!("{top}.{second}");
    for arc in &arcs[1..] {
        oid.push('.');
        oid.push_str(&arc.to_string());
    }
    Some(oid)
}

fn integer_magnitude(content: &[u8]) -> Vec<u8> {
    let start = content
        .iter()
        .position(|&byte| byte != 0)
        .unwrap_or(content.len().saturating_sub(1));
    content[start..].to_vec()
}

/// Decodes a string leaf: UTF-16BE for `BMPString`, UTF-8 with replacement otherwise.
#[must_use]
pub fn decode_string(tag: u8, content: &[u8]) -> String {
    if tag == TAG_BMP_STRING {
        let units: Vec<u16> = content
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(content).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::der;

    #[test]
    fn short_and_long_lengths() {
        let data = [0x04, 0x03, 1, 2, 3];
        let tag = read_cert_tag(&data, 0, Some(TAG_OCTET_STRING)).unwrap();
        assert_eq!((tag.header_size, tag.size), (2, 3));
        assert_eq!(tag.content(&data), &[1, 2, 3]);

        let long = der(TAG_OCTET_STRING, &[0xAB; 300]);
        let tag = read_cert_tag(&long, 0, None).unwrap();
        assert_eq!(&long[..4], &[0x04, 0x82, 0x01, 0x2C]);
        assert_eq!((tag.header_size, tag.size), (4, 300));
        assert_eq!(tag.end(), long.len());
    }

    #[test]
    fn rejected_tags() {
        // wrong tag
        assert!(read_cert_tag(&[0x04, 0x00], 0, Some(TAG_SEQUENCE)).is_none());
        // indefinite length
        assert!(read_cert_tag(&[0x30, 0x80, 0x00, 0x00], 0, None).is_none());
        // five length bytes
        assert!(read_cert_tag(&[0x04, 0x85, 0, 0, 0, 0, 1, 0], 0, None).is_none());
        // contents past the buffer
        assert!(read_cert_tag(&[0x04, 0x05, 1, 2], 0, None).is_none());
        // multi-byte tag number
        assert!(read_cert_tag(&[0x1F, 0x81, 0x00], 0, None).is_none());
        assert!(read_cert_tag(&[0x04], 0, None).is_none());
    }

    #[test]
    fn object_identifiers() {
        // 1.2.840.113549.1.7.2
        let content = [0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];
        assert_eq!(decode_oid(&content).unwrap(), "1.2.840.113549.1.7.2");
        // 2.5.4.3
        assert_eq!(decode_oid(&[0x55, 0x04, 0x03]).unwrap(), "2.5.4.3");
        // 2.999 uses a first sub-identifier above 80
        assert_eq!(decode_oid(&[0x88, 0x37]).unwrap(), "2.999");
        // dangling continuation bit
        assert!(decode_oid(&[0x2A, 0x86]).is_none());
        assert!(decode_oid(&[]).is_none());
    }

    #[test]
    fn nested_records() {
        let oid = der(TAG_OID, &[0x55, 0x04, 0x03]);
        let serial = der(TAG_INTEGER, &[0x00, 0x9F, 0x01]);
        let name = der(TAG_PRINTABLE_STRING, b"Test");
        let inner = der(TAG_SEQUENCE, &[oid, name].concat());
        let data = der(TAG_SEQUENCE, &[serial, der(TAG_SET, &inner)].concat());

        let record = get_cert_record(&data, 0, 8).unwrap();
        assert_eq!(record.children().len(), 2);
        assert_eq!(record.child(0).unwrap().integer().unwrap(), &[0x9F, 0x01]);

        let set = record.find(TAG_SET).unwrap();
        let pair = set.child(0).unwrap();
        assert_eq!(pair.child(0).unwrap().oid(), Some("2.5.4.3"));
        let leaf = pair.child(1).unwrap();
        assert_eq!(leaf.value, CertValue::Raw);
        assert_eq!(leaf.tag.content(&data), b"Test");
    }

    #[test]
    fn depth_limit() {
        let mut data = der(TAG_NULL, &[]);
        for _ in 0..10 {
            data = der(TAG_SEQUENCE, &data);
        }

        assert!(get_cert_record(&data, 0, 10).is_ok());
        assert!(matches!(
            get_cert_record(&data, 0, 4),
            Err(crate::Error::RecursionLimit(4))
        ));
    }

    #[test]
    fn overrunning_child() {
        // the child claims 4 bytes but its parent only holds 3
        let data = [0x30, 0x03, 0x04, 0x04, 0x01, 0x02, 0x03];
        assert!(get_cert_record(&data, 0, 8).is_err());
    }

    #[test]
    fn strings() {
        assert_eq!(decode_string(TAG_BMP_STRING, &[0x00, b'O', 0x00, b'K']), "OK");
        assert_eq!(decode_string(TAG_UTF8_STRING, "Zürich".as_bytes()), "Zürich");
    }
}
