//! RSA key loading.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::{Result, TrustError};

/// Parse a PEM private key, PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
/// (`BEGIN RSA PRIVATE KEY`).
pub fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    let pem = pem.trim();
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| TrustError::InvalidKey(format!("unreadable RSA private key: {}", e)))
}

/// Read and parse a PEM private key file.
pub fn read_private_key(path: impl AsRef<Path>) -> Result<RsaPrivateKey> {
    let path = path.as_ref();
    let pem = std::fs::read_to_string(path)
        .map_err(|e| TrustError::InvalidKey(format!("cannot read {}: {}", path.display(), e)))?;
    load_private_key(&pem)
}

/// Parse a PEM public key.
///
/// Accepts SPKI (`BEGIN PUBLIC KEY`), PKCS#1 (`BEGIN RSA PUBLIC KEY`) and
/// X.509 certificates, whose subject public key is used.
pub fn load_public_key(pem: &str) -> Result<RsaPublicKey> {
    let pem = pem.trim();
    if pem.contains("BEGIN CERTIFICATE") {
        return Ok(crate::certificates::parse_certificate(pem)?.public_key);
    }
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| TrustError::InvalidKey(format!("unreadable RSA public key: {}", e)))
}
