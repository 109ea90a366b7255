//! Platform certificates used to verify responses and webhooks.
//!
//! The platform publishes its certificates through `GET /v3/certificates`,
//! each sealed with the merchant's APIv3 key. Certificates are indexed by the
//! serial number read from the decrypted X.509 document itself; the outer
//! `serial_no` field of the listing is informational only.

mod store;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

use crate::aead::{self, EncryptedResource};
use crate::{Result, TrustError};

pub use store::{fetch_all, CertificateStore, CERTIFICATE_TTL};

/// Path of the certificate download endpoint.
pub const CERTIFICATES_PATH: &str = "/v3/certificates";

/// One entry of the certificate listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateEntry {
    /// Serial as reported by the listing.
    pub serial_no: String,
    /// Start of validity.
    #[serde(default)]
    pub effective_time: Option<DateTime<Utc>>,
    /// End of validity.
    #[serde(default)]
    pub expire_time: Option<DateTime<Utc>>,
    /// PEM certificate sealed with the APIv3 key.
    pub encrypt_certificate: EncryptedResource,
}

/// Body of `GET /v3/certificates`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CertificateListResponse {
    /// Certificates currently published.
    #[serde(default)]
    pub data: Vec<CertificateEntry>,
}

/// A decrypted and parsed platform certificate.
#[derive(Clone, Debug)]
pub struct PlatformCertificate {
    /// Upper-case hex serial number from the certificate.
    pub serial_no: String,
    /// Subject public key.
    pub public_key: RsaPublicKey,
    /// Start of validity.
    pub effective_time: DateTime<Utc>,
    /// End of validity.
    pub expire_time: DateTime<Utc>,
    /// The certificate in PEM form.
    pub pem: String,
}

impl PlatformCertificate {
    /// Whether `at` falls within the validity period.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_time <= at && at < self.expire_time
    }
}

/// Parse a PEM X.509 certificate holding an RSA key.
pub fn parse_certificate(pem: &str) -> Result<PlatformCertificate> {
    let pem = pem.trim();
    let cert = Certificate::from_pem(pem)
        .map_err(|e| TrustError::invalid_data("certificate", e.to_string()))?;
    let tbs = &cert.tbs_certificate;

    let serial_no = serial_hex(tbs.serial_number.as_bytes());

    let spki = tbs
        .subject_public_key_info
        .to_der()
        .map_err(|e| TrustError::invalid_data("certificate", e.to_string()))?;
    let public_key = RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| TrustError::InvalidKey(format!("certificate {} has no RSA key: {}", serial_no, e)))?;

    Ok(PlatformCertificate {
        effective_time: to_utc(tbs.validity.not_before.to_unix_duration()),
        expire_time: to_utc(tbs.validity.not_after.to_unix_duration()),
        serial_no,
        public_key,
        pem: pem.to_string(),
    })
}

/// Upper-case hex of a DER integer, without sign padding.
fn serial_hex(bytes: &[u8]) -> String {
    let start = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    hex::encode_upper(&bytes[start..])
}

fn to_utc(since_epoch: std::time::Duration) -> DateTime<Utc> {
    DateTime::from_timestamp(since_epoch.as_secs() as i64, 0).unwrap_or_default()
}

/// Certificates indexed by serial number.
#[derive(Clone, Debug, Default)]
pub struct CertificateSet {
    by_serial: HashMap<String, PlatformCertificate>,
}

impl CertificateSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from PEM certificates.
    pub fn from_pems<'a>(pems: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut set = Self::new();
        for pem in pems {
            set.insert(parse_certificate(pem)?);
        }
        Ok(set)
    }

    /// Add or replace a certificate.
    pub fn insert(&mut self, certificate: PlatformCertificate) {
        self.by_serial.insert(certificate.serial_no.clone(), certificate);
    }

    /// Look up a certificate; serials compare case-insensitively.
    pub fn get(&self, serial: &str) -> Option<&PlatformCertificate> {
        self.by_serial
            .get(serial)
            .or_else(|| self.by_serial.get(&serial.to_ascii_uppercase()))
    }

    /// The certificate that became effective last.
    pub fn newest(&self) -> Option<&PlatformCertificate> {
        self.by_serial.values().max_by_key(|c| c.effective_time)
    }

    /// Known serial numbers.
    pub fn serials(&self) -> impl Iterator<Item = &str> {
        self.by_serial.keys().map(String::as_str)
    }

    /// Iterate over all certificates.
    pub fn iter(&self) -> impl Iterator<Item = &PlatformCertificate> {
        self.by_serial.values()
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }
}

/// Decrypt and parse every entry of a certificate listing.
///
/// Any entry that fails to decrypt or parse fails the whole listing.
pub fn decrypt_certificate_list(entries: &[CertificateEntry], api_v3_key: &[u8]) -> Result<CertificateSet> {
    let mut set = CertificateSet::new();
    for entry in entries {
        let pem = aead::decrypt_resource(api_v3_key, &entry.encrypt_certificate).map_err(|e| {
            tracing::warn!(serial_no = %entry.serial_no, error = %e, "certificate decryption failed");
            TrustError::from(e)
        })?;
        let certificate = parse_certificate(&pem)?;
        if !certificate.serial_no.eq_ignore_ascii_case(&entry.serial_no) {
            tracing::warn!(
                listed = %entry.serial_no,
                actual = %certificate.serial_no,
                "listed serial differs from certificate, indexing by certificate"
            );
        }
        set.insert(certificate);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, seal_certificate, API_V3_KEY};

    #[test]
    fn test_parse_certificate_serial_and_validity() {
        let cert = parse_certificate(fixtures::PLATFORM_A_CERT_PEM).unwrap();
        assert_eq!(cert.serial_no, fixtures::PLATFORM_A_SERIAL);
        assert!(cert.effective_time < cert.expire_time);
        assert!(cert.is_valid_at(cert.effective_time + chrono::Duration::days(1)));
        assert!(!cert.is_valid_at(cert.expire_time));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_certificate("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----"),
            Err(TrustError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_serial_hex_strips_sign_byte() {
        assert_eq!(serial_hex(&[0x00, 0x9A, 0x01]), "9A01");
        assert_eq!(serial_hex(&[0x00]), "00");
        assert_eq!(serial_hex(&[0x7F]), "7F");
    }

    #[test]
    fn test_decrypt_list_indexes_by_certificate_serial() {
        // Outer serial deliberately wrong
        let mut entry = seal_certificate(fixtures::PLATFORM_A_CERT_PEM);
        entry.serial_no = "DEADBEEF".into();
        let second = seal_certificate(fixtures::PLATFORM_B_CERT_PEM);

        let set = decrypt_certificate_list(&[entry, second], API_V3_KEY).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.get("DEADBEEF").is_none());
        assert!(set.get(fixtures::PLATFORM_A_SERIAL).is_some());
        assert!(set.get(&fixtures::PLATFORM_B_SERIAL.to_lowercase()).is_some());
    }

    #[test]
    fn test_decrypt_list_wrong_key() {
        let entry = seal_certificate(fixtures::PLATFORM_A_CERT_PEM);
        let err = decrypt_certificate_list(&[entry], b"ffffffffffffffffffffffffffffffff").unwrap_err();
        assert!(matches!(err, TrustError::DecryptionFailed(_)));
    }

    #[test]
    fn test_newest() {
        let set = CertificateSet::from_pems([fixtures::PLATFORM_A_CERT_PEM, fixtures::PLATFORM_B_CERT_PEM]).unwrap();
        let newest = set.newest().unwrap();
        assert!(set.iter().all(|c| c.effective_time <= newest.effective_time));
        assert!(CertificateSet::new().newest().is_none());
    }

    #[test]
    fn test_listing_deserialize() {
        let body = serde_json::json!({
            "data": [{
                "serial_no": "5157F09EFDC096DE15EBE81A47057A7232F1B8E1",
                "effective_time": "2018-06-08T10:34:56+08:00",
                "expire_time": "2023-06-08T10:34:56+08:00",
                "encrypt_certificate": {
                    "algorithm": "AEAD_AES_256_GCM",
                    "nonce": "61f9c719728a",
                    "associated_data": "certificate",
                    "ciphertext": "sRvt"
                }
            }]
        });
        let listing: CertificateListResponse = serde_json::from_value(body).unwrap();
        assert_eq!(listing.data.len(), 1);
        assert_eq!(
            listing.data[0].effective_time.unwrap().to_rfc3339(),
            "2018-06-08T02:34:56+00:00"
        );
    }
}
