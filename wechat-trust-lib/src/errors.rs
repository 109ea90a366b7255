//! Error types for trust-layer operations.
//!
//! Every cryptographic failure is terminal for the operation that raised it.
//! Error messages carry identifiers (app ids, certificate serials, platform
//! error codes) but never key material or decrypted content.

use std::fmt;

/// Error codes for FFI and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TrustErrorCode {
    /// Structurally invalid binary envelope
    MalformedEnvelope = 1000,
    /// Identity tag disagrees with the expected app id
    IdentityMismatch = 1001,
    /// Message digest over (token, timestamp, nonce, ciphertext) did not match
    SignatureMismatch = 2000,
    /// RSA signature did not verify
    SignatureInvalid = 2001,
    /// Certificate serial not present in the store
    UnknownCertificate = 2002,
    /// Key material could not be loaded or has the wrong size
    InvalidKey = 3000,
    /// Encryption failed
    EncryptionFailed = 3001,
    /// Decryption or authentication failed
    DecryptionFailed = 3002,
    /// No valid credential and refresh failed
    CredentialUnavailable = 4000,
    /// Cache backend failure
    Cache = 4001,
    /// Invalid request/data
    InvalidData = 5000,
    /// Serialization error
    Serialization = 5001,
    /// Transport/network layer error
    Transport = 6000,
    /// Platform returned an error code
    Platform = 6001,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Error type for trust-layer operations.
#[derive(Debug)]
pub enum TrustError {
    /// Binary envelope is truncated or otherwise structurally invalid.
    MalformedEnvelope(String),

    /// Decrypted identity tag disagrees with the expected app id.
    IdentityMismatch {
        /// App id the caller expected
        expected: String,
        /// App id found in the envelope
        found: String,
    },

    /// Recomputed message signature differs from the supplied one.
    SignatureMismatch,

    /// RSA signature verification failed.
    SignatureInvalid {
        /// Serial of the certificate used for verification
        serial: String,
    },

    /// No certificate with this serial is known.
    UnknownCertificate {
        /// Serial requested by the caller
        serial: String,
    },

    /// Key material is malformed or has the wrong length.
    InvalidKey(String),

    /// Encryption failed.
    EncryptionFailed(String),

    /// Decryption or AEAD authentication failed.
    DecryptionFailed(String),

    /// No fresh credential is cached and refreshing it failed.
    CredentialUnavailable {
        /// Credential identity, e.g. `wx123:access_token`
        key: String,
        /// Reason the refresh failed
        reason: String,
    },

    /// Cache backend failure.
    Cache(String),

    /// Invalid data provided.
    InvalidData {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Serialization/deserialization error.
    Serialization(String),

    /// Transport/network layer error.
    Transport(String),

    /// Platform responded with a non-zero error code.
    Platform {
        /// Platform error code
        errcode: i64,
        /// Platform error message
        errmsg: String,
    },

    /// Internal/unexpected error.
    Internal(String),
}

impl TrustError {
    /// Get the error code.
    pub fn code(&self) -> TrustErrorCode {
        match self {
            Self::MalformedEnvelope(_) => TrustErrorCode::MalformedEnvelope,
            Self::IdentityMismatch { .. } => TrustErrorCode::IdentityMismatch,
            Self::SignatureMismatch => TrustErrorCode::SignatureMismatch,
            Self::SignatureInvalid { .. } => TrustErrorCode::SignatureInvalid,
            Self::UnknownCertificate { .. } => TrustErrorCode::UnknownCertificate,
            Self::InvalidKey(_) => TrustErrorCode::InvalidKey,
            Self::EncryptionFailed(_) => TrustErrorCode::EncryptionFailed,
            Self::DecryptionFailed(_) => TrustErrorCode::DecryptionFailed,
            Self::CredentialUnavailable { .. } => TrustErrorCode::CredentialUnavailable,
            Self::Cache(_) => TrustErrorCode::Cache,
            Self::InvalidData { .. } => TrustErrorCode::InvalidData,
            Self::Serialization(_) => TrustErrorCode::Serialization,
            Self::Transport(_) => TrustErrorCode::Transport,
            Self::Platform { .. } => TrustErrorCode::Platform,
            Self::Internal(_) => TrustErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// `UnknownCertificate` is retryable once the certificate set has been
    /// re-fetched. Cryptographic failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Cache(_)
                | Self::UnknownCertificate { .. }
                | Self::CredentialUnavailable { .. }
        )
    }

    /// Returns true if the error was raised by a tampered or forged input.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            Self::SignatureMismatch
                | Self::SignatureInvalid { .. }
                | Self::IdentityMismatch { .. }
                | Self::DecryptionFailed(_)
        )
    }

    /// Create a transport error from any error type.
    pub fn transport<E: std::error::Error>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    /// Create an invalid data error.
    pub fn invalid_data(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown certificate error.
    pub fn unknown_certificate(serial: impl Into<String>) -> Self {
        Self::UnknownCertificate {
            serial: serial.into(),
        }
    }

    /// Create a credential unavailable error.
    pub fn credential_unavailable(key: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::CredentialUnavailable {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Request id embedded in a platform error message, if any.
    ///
    /// The platform appends `rid: <id>` to `errmsg`, which support needs to
    /// trace a failing call.
    pub fn platform_rid(&self) -> Option<&str> {
        match self {
            Self::Platform { errmsg, .. } => parse_rid(errmsg),
            _ => None,
        }
    }
}

/// Extract the `rid:` suffix of a platform error message.
///
/// ```
/// use wechat_trust_lib::errors::parse_rid;
///
/// let msg = "invalid credential, access_token is invalid or not latest rid: 626d1edb-0ff6bf1f-3bc3f260";
/// assert_eq!(parse_rid(msg), Some("626d1edb-0ff6bf1f-3bc3f260"));
/// assert_eq!(parse_rid("ok"), None);
/// ```
pub fn parse_rid(errmsg: &str) -> Option<&str> {
    let idx = errmsg.find("rid:")?;
    let rid = errmsg[idx + 4..].trim();
    if rid.is_empty() {
        None
    } else {
        Some(rid)
    }
}

impl fmt::Display for TrustError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEnvelope(msg) => write!(f, "malformed envelope: {}", msg),
            Self::IdentityMismatch { expected, found } => {
                write!(f, "identity mismatch: expected {}, found {}", expected, found)
            }
            Self::SignatureMismatch => write!(f, "message signature mismatch"),
            Self::SignatureInvalid { serial } => {
                write!(f, "signature verification failed with certificate {}", serial)
            }
            Self::UnknownCertificate { serial } => {
                write!(f, "unknown platform certificate: {}", serial)
            }
            Self::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
            Self::EncryptionFailed(msg) => write!(f, "encryption failed: {}", msg),
            Self::DecryptionFailed(msg) => write!(f, "decryption failed: {}", msg),
            Self::CredentialUnavailable { key, reason } => {
                write!(f, "credential {} unavailable: {}", key, reason)
            }
            Self::Cache(msg) => write!(f, "cache error: {}", msg),
            Self::InvalidData { field, reason } => write!(f, "invalid {}: {}", field, reason),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Platform { errcode, errmsg } => {
                write!(f, "platform error {}: {}", errcode, errmsg)
            }
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for TrustError {}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for TrustError {
    fn from(err: base64::DecodeError) -> Self {
        Self::invalid_data("base64", err.to_string())
    }
}
