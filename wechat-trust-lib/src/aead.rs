//! AES-256-GCM resource cipher of the pay APIv3.
//!
//! Platform certificates and webhook payloads arrive as
//! [`EncryptedResource`]s sealed with the merchant's APIv3 key:
//!
//! ```text
//! ciphertext = base64(AES-256-GCM(key, nonce, associated_data, plaintext) || tag[16])
//! ```
//!
//! The nonce is a 12-character string used byte for byte as the GCM IV.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::nonce::create_nonce_str;
use crate::TrustError;

/// Algorithm name carried in encrypted resources.
pub const ALGORITHM: &str = "AEAD_AES_256_GCM";

/// Required key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Required nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// AEAD error types.
#[derive(Debug, thiserror::Error)]
pub enum AeadError {
    #[error("key must be {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("nonce must be {NONCE_SIZE} bytes, got {0}")]
    InvalidNonceLength(usize),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("ciphertext is not valid base64")]
    InvalidBase64,
    #[error("ciphertext shorter than the authentication tag")]
    Truncated,
    #[error("authentication failed")]
    Authentication,
    #[error("encryption failed")]
    Encrypt,
    #[error("plaintext is not valid UTF-8")]
    Utf8,
}

/// Result type for AEAD operations.
pub type AeadResult<T> = Result<T, AeadError>;

impl From<AeadError> for TrustError {
    fn from(err: AeadError) -> Self {
        match err {
            AeadError::InvalidKeyLength(_) => TrustError::InvalidKey(err.to_string()),
            AeadError::Encrypt => TrustError::EncryptionFailed(err.to_string()),
            _ => TrustError::DecryptionFailed(err.to_string()),
        }
    }
}

/// An encrypted payload as found in certificate downloads and webhooks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    /// Always [`ALGORITHM`].
    pub algorithm: String,
    /// Base64 ciphertext with the tag appended.
    pub ciphertext: String,
    /// Associated data, possibly empty.
    #[serde(default)]
    pub associated_data: String,
    /// 12-character nonce.
    pub nonce: String,
    /// Type of the original object, e.g. `transaction`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
}

fn cipher(key: &[u8]) -> AeadResult<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(AeadError::InvalidKeyLength(key.len()));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| AeadError::InvalidKeyLength(key.len()))
}

fn nonce(nonce: &str) -> AeadResult<&Nonce<aes_gcm::aead::consts::U12>> {
    if nonce.len() != NONCE_SIZE {
        return Err(AeadError::InvalidNonceLength(nonce.len()));
    }
    Ok(Nonce::from_slice(nonce.as_bytes()))
}

/// Decrypt base64 `ciphertext || tag`.
pub fn decrypt(key: &[u8], nonce_str: &str, associated_data: &str, ciphertext_b64: &str) -> AeadResult<Vec<u8>> {
    let cipher = cipher(key)?;
    let nonce = nonce(nonce_str)?;
    let sealed = STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|_| AeadError::InvalidBase64)?;
    if sealed.len() < TAG_SIZE {
        return Err(AeadError::Truncated);
    }

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &sealed,
                aad: associated_data.as_bytes(),
            },
        )
        .map_err(|_| AeadError::Authentication)
}

/// Encrypt `plaintext`, returning base64 `ciphertext || tag`.
pub fn encrypt(key: &[u8], nonce_str: &str, associated_data: &str, plaintext: &[u8]) -> AeadResult<String> {
    let cipher = cipher(key)?;
    let nonce = nonce(nonce_str)?;
    let sealed = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: associated_data.as_bytes(),
            },
        )
        .map_err(|_| AeadError::Encrypt)?;
    Ok(STANDARD.encode(sealed))
}

/// Decrypt a resource to UTF-8 text.
pub fn decrypt_resource(key: &[u8], resource: &EncryptedResource) -> AeadResult<String> {
    if resource.algorithm != ALGORITHM {
        return Err(AeadError::UnsupportedAlgorithm(resource.algorithm.clone()));
    }
    let plaintext = decrypt(key, &resource.nonce, &resource.associated_data, &resource.ciphertext)?;
    String::from_utf8(plaintext).map_err(|_| AeadError::Utf8)
}

/// Seal `plaintext` into a resource with a random nonce.
pub fn encrypt_resource(key: &[u8], associated_data: &str, plaintext: &str) -> AeadResult<EncryptedResource> {
    let nonce = create_nonce_str(NONCE_SIZE);
    let ciphertext = encrypt(key, &nonce, associated_data, plaintext.as_bytes())?;
    Ok(EncryptedResource {
        algorithm: ALGORITHM.to_string(),
        ciphertext,
        associated_data: associated_data.to_string(),
        nonce,
        original_type: None,
    })
}
