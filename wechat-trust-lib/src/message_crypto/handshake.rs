//! Server URL handshake and callback query parameters.

use serde::Deserialize;

use super::signature_matches;

/// Response body for a failed handshake.
pub const HANDSHAKE_FAIL: &str = "fail";

/// Query parameters the platform appends to every push request.
///
/// `echostr` is only present on the handshake request; `msg_signature` only
/// when the message body is encrypted.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Digest over `(token, timestamp, nonce)`.
    #[serde(default)]
    pub signature: String,
    /// Unix timestamp as sent by the platform.
    #[serde(default)]
    pub timestamp: String,
    /// Random nonce.
    #[serde(default)]
    pub nonce: String,
    /// Handshake challenge to echo back.
    pub echostr: Option<String>,
    /// Digest over `(token, timestamp, nonce, ciphertext)` for encrypted bodies.
    pub msg_signature: Option<String>,
    /// `aes` when the body is encrypted.
    pub encrypt_type: Option<String>,
    /// Sender open id.
    pub openid: Option<String>,
}

impl CallbackQuery {
    /// Whether the body is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encrypt_type.as_deref() == Some("aes")
    }
}

/// Check a handshake `signature` against `token`, `timestamp` and `nonce`.
pub fn verify_handshake(token: &str, signature: &str, timestamp: &str, nonce: &str) -> bool {
    signature_matches(signature, &[token, timestamp, nonce])
}

/// Body to answer a handshake request with: `echostr` on success, `fail` otherwise.
pub fn handshake_response(token: &str, query: &CallbackQuery) -> String {
    let verified = verify_handshake(token, &query.signature, &query.timestamp, &query.nonce);
    match (&query.echostr, verified) {
        (Some(echostr), true) => echostr.clone(),
        _ => {
            tracing::warn!(timestamp = %query.timestamp, "handshake signature rejected");
            HANDSHAKE_FAIL.to_string()
        }
    }
}
