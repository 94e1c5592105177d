//! Names of the object identifiers found in Authenticode signatures.

/// Human-readable label of a well-known OID.
#[must_use]
pub fn oid_name(oid: &str) -> Option<&'static str> {
    let name = match oid {
        // PKCS#1
        "1.2.840.113549.1.1.1" => "rsaEncryption",
        "1.2.840.113549.1.1.4" => "md5WithRSAEncryption",
        "1.2.840.113549.1.1.5" => "sha1WithRSAEncryption",
        "1.2.840.113549.1.1.10" => "rsassa-pss",
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption",
        "1.2.840.113549.1.1.12" => "sha384WithRSAEncryption",
        "1.2.840.113549.1.1.13" => "sha512WithRSAEncryption",
        // ECDSA
        "1.2.840.10045.2.1" => "ecPublicKey",
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256",
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384",
        "1.2.840.10045.4.3.4" => "ecdsa-with-SHA512",
        // digests
        "1.2.840.113549.2.5" => "md5",
        "1.3.14.3.2.26" => "sha1",
        "2.16.840.1.101.3.4.2.1" => "sha256",
        "2.16.840.1.101.3.4.2.2" => "sha384",
        "2.16.840.1.101.3.4.2.3" => "sha512",
        // PKCS#7 and PKCS#9
        "1.2.840.113549.1.7.1" => "data",
        "1.2.840.113549.1.7.2" => "signedData",
        "1.2.840.113549.1.9.1" => "emailAddress",
        "1.2.840.113549.1.9.3" => "contentType",
        "1.2.840.113549.1.9.4" => "messageDigest",
        "1.2.840.113549.1.9.5" => "signingTime",
        "1.2.840.113549.1.9.6" => "counterSignature",
        "1.2.840.113549.1.9.16.1.4" => "tstInfo",
        // Authenticode
        "1.3.6.1.4.1.311.2.1.4" => "SPC_INDIRECT_DATA",
        "1.3.6.1.4.1.311.2.1.11" => "SPC_STATEMENT_TYPE",
        "1.3.6.1.4.1.311.2.1.12" => "SPC_SP_OPUS_INFO",
        "1.3.6.1.4.1.311.2.1.15" => "SPC_PE_IMAGE_DATA",
        "1.3.6.1.4.1.311.2.1.21" => "SPC_INDIVIDUAL_SP_KEY_PURPOSE",
        "1.3.6.1.4.1.311.2.1.22" => "SPC_COMMERCIAL_SP_KEY_PURPOSE",
        "1.3.6.1.4.1.311.2.4.1" => "SPC_NESTED_SIGNATURE",
        "1.3.6.1.4.1.311.3.3.1" => "SPC_RFC3161_TIMESTAMP",
        "1.3.6.1.4.1.311.10.3.13" => "lifetimeSigning",
        // X.520 attributes
        "2.5.4.3" => "commonName",
        "2.5.4.5" => "serialNumber",
        "2.5.4.6" => "countryName",
        "2.5.4.7" => "localityName",
        "2.5.4.8" => "stateOrProvinceName",
        "2.5.4.9" => "streetAddress",
        "2.5.4.10" => "organizationName",
        "2.5.4.11" => "organizationalUnitName",
        // X.509 extensions
        "2.5.29.14" => "subjectKeyIdentifier",
        "2.5.29.15" => "keyUsage",
        "2.5.29.17" => "subjectAltName",
        "2.5.29.19" => "basicConstraints",
        "2.5.29.31" => "cRLDistributionPoints",
        "2.5.29.32" => "certificatePolicies",
        "2.5.29.35" => "authorityKeyIdentifier",
        "2.5.29.37" => "extKeyUsage",
        "1.3.6.1.5.5.7.1.1" => "authorityInfoAccess",
        "1.3.6.1.5.5.7.3.3" => "codeSigning",
        "1.3.6.1.5.5.7.3.8" => "timeStamping",
        _ => return None,
    };
    Some(name)
}

/// Short key used when printing distinguished names, e.g. `CN`.
#[must_use]
pub fn attribute_key(oid: &str) -> Option<&'static str> {
    match oid {
        "2.5.4.3" => Some("CN"),
        "2.5.4.5" => Some("SERIALNUMBER"),
        "2.5.4.6" => Some("C"),
        "2.5.4.7" => Some("L"),
        "2.5.4.8" => Some("ST"),
        "2.5.4.9" => Some("STREET"),
        "2.5.4.10" => Some("O"),
        "2.5.4.11" => Some("OU"),
        "1.2.840.113549.1.9.1" => Some("E"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown() {
        assert_eq!(oid_name("1.2.840.113549.1.7.2"), Some("signedData"));
        assert_eq!(oid_name("2.16.840.1.101.3.4.2.1"), Some("sha256"));
        assert_eq!(oid_name("1.3.6.1.4.1.311.2.1.4"), Some("SPC_INDIRECT_DATA"));
        assert_eq!(oid_name("1.2.3.4"), None);

        assert_eq!(attribute_key("2.5.4.10"), Some("O"));
        assert_eq!(attribute_key("2.5.29.15"), None);
    }
}
