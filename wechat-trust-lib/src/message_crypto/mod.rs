//! Push-message encryption for official accounts and third-party platforms.
//!
//! Messages travel as AES-256-CBC ciphertext of an [`envelope`](crate::envelope)
//! padded to 32-byte blocks, together with a SHA-1 digest over the sorted
//! `(token, timestamp, nonce, ciphertext)` tuple.
//!
//! # Key Derivation
//!
//! The 32-byte AES key is the base64 decoding of the 43-character
//! `EncodingAESKey` with `=` appended; the IV is the first 16 bytes of the key.
//!
//! # Example
//!
//! ```
//! use wechat_trust_lib::config::AppIdentity;
//! use wechat_trust_lib::message_crypto::MessageCrypto;
//!
//! let identity = AppIdentity::new("wxb11529c136998cb6", "secret")
//!     .with_token("pamtest")
//!     .with_encoding_aes_key("abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG");
//! let crypto = MessageCrypto::new(identity).unwrap();
//!
//! let xml = crypto.encrypt_message("<xml>hello</xml>", "1409304348", "xxxxxx").unwrap();
//! assert_eq!(crypto.decrypt_xml(&xml).unwrap(), "<xml>hello</xml>");
//! ```

pub mod handshake;
pub mod padding;
pub mod xml;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::Engine;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::AppIdentity;
use crate::envelope;
use crate::{Result, TrustError};

pub use handshake::{handshake_response, verify_handshake, CallbackQuery, HANDSHAKE_FAIL};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the configured `EncodingAESKey`.
pub const ENCODING_AES_KEY_LEN: usize = 43;

/// AES block size; ciphertext must be a multiple of it.
const AES_BLOCK_SIZE: usize = 16;

/// Base64 engine that accepts non-zero trailing bits.
///
/// A random 43-character key rarely ends on a canonical base64 boundary.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// AES-256 key for push messages.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey {
    key: [u8; 32],
}

impl MessageKey {
    /// Wrap raw key bytes.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the key from a 43-character `EncodingAESKey`.
    pub fn from_encoding_aes_key(encoding_aes_key: &str) -> Result<Self> {
        if encoding_aes_key.len() != ENCODING_AES_KEY_LEN {
            return Err(TrustError::InvalidKey(format!(
                "EncodingAESKey must be {} characters, got {}",
                ENCODING_AES_KEY_LEN,
                encoding_aes_key.len()
            )));
        }

        let mut decoded = LENIENT_BASE64
            .decode(format!("{}=", encoding_aes_key))
            .map_err(|e| TrustError::InvalidKey(format!("EncodingAESKey is not base64: {}", e)))?;

        let key: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
            TrustError::InvalidKey(format!("decoded key is {} bytes, expected 32", decoded.len()))
        })?;
        decoded.zeroize();

        Ok(Self { key })
    }

    /// The IV: first 16 bytes of the key.
    pub fn iv(&self) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&self.key[..16]);
        iv
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MessageKey(<redacted>)")
    }
}

/// SHA-1 hex digest over `parts` sorted lexicographically and concatenated.
pub fn sha1_signature(parts: &[&str]) -> String {
    let mut sorted = parts.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha1::new();
    for part in sorted {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Constant-time check of `signature` against the digest of `parts`.
pub(crate) fn signature_matches(signature: &str, parts: &[&str]) -> bool {
    let expected = sha1_signature(parts);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Encrypted message with its signature, as exchanged on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedEnvelope {
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Hex SHA-1 digest.
    pub signature: String,
    /// Timestamp included in the digest.
    pub timestamp: String,
    /// Nonce included in the digest.
    pub nonce: String,
}

impl SignedEnvelope {
    /// Render the `<xml>` wire form.
    pub fn to_xml(&self) -> String {
        format!(
            "<xml><Encrypt>{}</Encrypt><MsgSignature>{}</MsgSignature><TimeStamp>{}</TimeStamp><Nonce>{}</Nonce></xml>",
            xml::cdata(&self.ciphertext),
            xml::cdata(&self.signature),
            self.timestamp,
            xml::cdata(&self.nonce),
        )
    }

    /// Parse the `<xml>` wire form produced by [`SignedEnvelope::to_xml`].
    pub fn from_xml(doc: &str) -> Result<Self> {
        Ok(Self {
            ciphertext: xml::required_element(doc, "Encrypt")?.to_string(),
            signature: xml::required_element(doc, "MsgSignature")?.to_string(),
            timestamp: xml::required_element(doc, "TimeStamp")?.to_string(),
            nonce: xml::required_element(doc, "Nonce")?.to_string(),
        })
    }

    /// Whether `signature` matches the digest computed with `token`.
    pub fn verify(&self, token: &str) -> bool {
        signature_matches(
            &self.signature,
            &[token, &self.timestamp, &self.nonce, &self.ciphertext],
        )
    }
}

/// Encrypt `plaintext` into a signed envelope.
///
/// The identity tag is `identity.app_id` and the signature uses
/// `identity.token`.
pub fn encrypt(
    identity: &AppIdentity,
    key: &MessageKey,
    iv: &[u8; 16],
    plaintext: &str,
    timestamp: &str,
    nonce: &str,
) -> Result<SignedEnvelope> {
    let ciphertext = encrypt_payload(key, iv, plaintext.as_bytes(), &identity.app_id)?;
    let signature = sha1_signature(&[&identity.token, timestamp, nonce, &ciphertext]);

    Ok(SignedEnvelope {
        ciphertext,
        signature,
        timestamp: timestamp.to_string(),
        nonce: nonce.to_string(),
    })
}

/// Verify and decrypt a signed envelope.
///
/// The signature is checked with `expected_token` before any AES operation;
/// the identity tag must equal `identity.app_id`.
pub fn decrypt(
    identity: &AppIdentity,
    key: &MessageKey,
    iv: &[u8; 16],
    signed: &SignedEnvelope,
    expected_token: &str,
) -> Result<String> {
    if !signed.verify(expected_token) {
        tracing::warn!(app_id = %identity.app_id, timestamp = %signed.timestamp, "push message signature mismatch");
        return Err(TrustError::SignatureMismatch);
    }

    decrypt_payload(key, iv, &signed.ciphertext, Some(&identity.app_id))
}

/// Envelope, pad and AES-256-CBC encrypt, returning base64.
pub fn encrypt_payload(
    key: &MessageKey,
    iv: &[u8; 16],
    plaintext: &[u8],
    app_id: &str,
) -> Result<String> {
    let mut buf = envelope::encode(plaintext, app_id.as_bytes())?;
    padding::pad(&mut buf);

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| TrustError::InvalidKey(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<NoPadding>(&buf);
    buf.zeroize();

    Ok(STANDARD.encode(ciphertext))
}

/// Base64-decode, AES-256-CBC decrypt, unpad and open the envelope.
///
/// The signature must have been verified by the caller.
pub fn decrypt_payload(
    key: &MessageKey,
    iv: &[u8; 16],
    ciphertext_b64: &str,
    expected_app_id: Option<&str>,
) -> Result<String> {
    let ciphertext = STANDARD.decode(ciphertext_b64.trim())?;
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(TrustError::MalformedEnvelope(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            AES_BLOCK_SIZE
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| TrustError::InvalidKey(e.to_string()))?;
    let mut decrypted = cipher
        .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
        .map_err(|_| TrustError::MalformedEnvelope("ciphertext is not block aligned".into()))?;

    let opened = envelope::decode(padding::unpad(&decrypted), expected_app_id);
    decrypted.zeroize();
    let opened = opened.inspect_err(|err| {
        if let TrustError::IdentityMismatch { expected, found } = err {
            tracing::warn!(%expected, %found, "push message addressed to another app");
        }
    })?;

    String::from_utf8(opened.payload)
        .map_err(|_| TrustError::MalformedEnvelope("payload is not valid UTF-8".into()))
}

/// Push-message cipher bound to one [`AppIdentity`].
#[derive(Clone)]
pub struct MessageCrypto {
    identity: AppIdentity,
    key: MessageKey,
    iv: [u8; 16],
}

impl std::fmt::Debug for MessageCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCrypto")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl MessageCrypto {
    /// Derive the key material of `identity`.
    pub fn new(identity: AppIdentity) -> Result<Self> {
        let key = identity.message_key()?;
        let iv = key.iv();
        Ok(Self { identity, key, iv })
    }

    /// The identity this cipher serves.
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Encrypt `plaintext` and render the XML wire form.
    pub fn encrypt_message(&self, plaintext: &str, timestamp: &str, nonce: &str) -> Result<String> {
        Ok(self.encrypt(plaintext, timestamp, nonce)?.to_xml())
    }

    /// Encrypt `plaintext` into a signed envelope.
    pub fn encrypt(&self, plaintext: &str, timestamp: &str, nonce: &str) -> Result<SignedEnvelope> {
        encrypt(&self.identity, &self.key, &self.iv, plaintext, timestamp, nonce)
    }

    /// Verify and decrypt a signed envelope using this identity's token.
    pub fn decrypt(&self, signed: &SignedEnvelope) -> Result<String> {
        decrypt(&self.identity, &self.key, &self.iv, signed, &self.identity.token)
    }

    /// Verify and decrypt a full `<xml>` document carrying its own signature.
    pub fn decrypt_xml(&self, doc: &str) -> Result<String> {
        self.decrypt(&SignedEnvelope::from_xml(doc)?)
    }

    /// Verify and decrypt an inbound push body.
    ///
    /// The platform puts `msg_signature`, `timestamp` and `nonce` in the query
    /// string and only the `Encrypt` element in the body.
    pub fn decrypt_message(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        body: &str,
    ) -> Result<String> {
        let signed = SignedEnvelope {
            ciphertext: xml::required_element(body, "Encrypt")?.to_string(),
            signature: msg_signature.to_string(),
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        };
        self.decrypt(&signed)
    }

    /// Decrypt a push request given its query parameters.
    ///
    /// Falls back to the body's own `MsgSignature` when the query carries none.
    pub fn decrypt_callback(&self, query: &CallbackQuery, body: &str) -> Result<String> {
        let msg_signature = match query.msg_signature.as_deref() {
            Some(signature) => signature,
            None => xml::element_text(body, "MsgSignature")
                .ok_or_else(|| TrustError::invalid_data("msg_signature", "missing from query and body"))?,
        };
        self.decrypt_message(msg_signature, &query.timestamp, &query.nonce, body)
    }

    /// Answer a server URL handshake.
    pub fn handshake_response(&self, query: &CallbackQuery) -> String {
        handshake_response(&self.identity.token, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODING_AES_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
    const VIDEO_XML: &str = "<xml><ToUserName><![CDATA[oia2Tj我是中文jewbmiOUlr6X-1crbLOvLw]]></ToUserName><FromUserName><![CDATA[gh_7f083739789a]]></FromUserName><CreateTime>1407743423</CreateTime><MsgType><![CDATA[video]]></MsgType><Video><MediaId><![CDATA[eYJ1MbwPRJtOvIEabaxHs7TX2D-HV71s79GUxqdUkjm6Gs2Ed1KF3ulAOA9H1xG0]]></MediaId><Title><![CDATA[testCallBackReplyVideo]]></Title><Description><![CDATA[testCallBackReplyVideo]]></Description></Video></xml>";

    fn identity() -> AppIdentity {
        AppIdentity::new("wxb11529c136998cb6", "secret")
            .with_token("pamtest")
            .with_encoding_aes_key(ENCODING_AES_KEY)
    }

    fn crypto() -> MessageCrypto {
        MessageCrypto::new(identity()).unwrap()
    }

    #[test]
    fn test_key_derivation() {
        let key = MessageKey::from_encoding_aes_key(ENCODING_AES_KEY).unwrap();
        assert_eq!(key.as_bytes().len(), 32);
        assert_eq!(&key.iv(), &key.as_bytes()[..16]);
    }

    #[test]
    fn test_key_derivation_rejects_bad_length() {
        assert!(matches!(
            MessageKey::from_encoding_aes_key("short"),
            Err(TrustError::InvalidKey(_))
        ));
        assert!(matches!(
            MessageKey::from_encoding_aes_key("!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!"),
            Err(TrustError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_sha1_signature_is_order_independent() {
        let a = sha1_signature(&["pamtest", "1409304348", "xxxxxx"]);
        let b = sha1_signature(&["xxxxxx", "pamtest", "1409304348"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_sha1_signature_known_value() {
        // sha1("abc")
        assert_eq!(
            sha1_signature(&["c", "a", "b"]),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_example_vector_roundtrip() {
        let crypto = crypto();
        let xml = crypto.encrypt_message(VIDEO_XML, "1409304348", "xxxxxx").unwrap();
        assert_eq!(crypto.decrypt_xml(&xml).unwrap(), VIDEO_XML);
    }

    #[test]
    fn test_ciphertext_is_32_byte_aligned() {
        let key = MessageKey::from_encoding_aes_key(ENCODING_AES_KEY).unwrap();
        for len in [0usize, 1, 11, 12, 13, 44, 100] {
            let plaintext = "a".repeat(len);
            let b64 = encrypt_payload(&key, &key.iv(), plaintext.as_bytes(), "wx").unwrap();
            let raw = STANDARD.decode(b64).unwrap();
            assert_eq!(raw.len() % padding::BLOCK_SIZE, 0, "len {len}");
        }
    }

    #[test]
    fn test_xml_wire_form() {
        let signed = crypto().encrypt("hi", "1409304348", "xxxxxx").unwrap();
        let xml = signed.to_xml();
        assert!(xml.starts_with("<xml><Encrypt><![CDATA["));
        assert!(xml.contains("<TimeStamp>1409304348</TimeStamp>"));
        assert!(xml.contains("<Nonce><![CDATA[xxxxxx]]></Nonce>"));
        assert_eq!(SignedEnvelope::from_xml(&xml).unwrap(), signed);
    }

    #[test]
    fn test_tampered_fields_fail_before_decryption() {
        let crypto = crypto();
        let signed = crypto.encrypt(VIDEO_XML, "1409304348", "xxxxxx").unwrap();

        let mut bad = signed.clone();
        bad.timestamp = "1409304349".into();
        assert!(matches!(crypto.decrypt(&bad), Err(TrustError::SignatureMismatch)));

        let mut bad = signed.clone();
        bad.nonce = "xxxxxy".into();
        assert!(matches!(crypto.decrypt(&bad), Err(TrustError::SignatureMismatch)));

        // Garbage ciphertext: the signature check must reject it, not the base64 decoder
        let mut bad = signed.clone();
        bad.ciphertext = "not base64 at all!".into();
        assert!(matches!(crypto.decrypt(&bad), Err(TrustError::SignatureMismatch)));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let crypto = crypto();
        let signed = crypto.encrypt("hi", "1", "n").unwrap();
        let key = MessageKey::from_encoding_aes_key(ENCODING_AES_KEY).unwrap();
        let result = decrypt(&identity(), &key, &key.iv(), &signed, "other-token");
        assert!(matches!(result, Err(TrustError::SignatureMismatch)));
    }

    #[test]
    fn test_identity_mismatch_fails_closed() {
        let sender = crypto();
        let signed = sender.encrypt("hi", "1", "n").unwrap();

        let receiver = MessageCrypto::new(
            AppIdentity::new("wx-someone-else", "")
                .with_token("pamtest")
                .with_encoding_aes_key(ENCODING_AES_KEY),
        )
        .unwrap();

        assert!(matches!(
            receiver.decrypt(&signed),
            Err(TrustError::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_decrypt_message_from_push_body() {
        let crypto = crypto();
        let signed = crypto.encrypt("<xml>event</xml>", "1409304348", "xxxxxx").unwrap();
        let body = format!(
            "<xml><ToUserName><![CDATA[gh_7f083739789a]]></ToUserName><Encrypt><![CDATA[{}]]></Encrypt></xml>",
            signed.ciphertext
        );

        let plaintext = crypto
            .decrypt_message(&signed.signature, "1409304348", "xxxxxx", &body)
            .unwrap();
        assert_eq!(plaintext, "<xml>event</xml>");

        let query = CallbackQuery {
            timestamp: "1409304348".into(),
            nonce: "xxxxxx".into(),
            msg_signature: Some(signed.signature.clone()),
            encrypt_type: Some("aes".into()),
            ..Default::default()
        };
        assert_eq!(crypto.decrypt_callback(&query, &body).unwrap(), "<xml>event</xml>");

        let query = CallbackQuery {
            msg_signature: None,
            ..query
        };
        assert!(matches!(
            crypto.decrypt_callback(&query, &body),
            Err(TrustError::InvalidData { .. })
        ));

        // Full wire form carries its own MsgSignature
        assert_eq!(
            crypto.decrypt_callback(&query, &signed.to_xml()).unwrap(),
            "<xml>event</xml>"
        );
    }

    #[test]
    fn test_unaligned_ciphertext_rejected() {
        let key = MessageKey::from_encoding_aes_key(ENCODING_AES_KEY).unwrap();
        let b64 = STANDARD.encode([0u8; 20]);
        assert!(matches!(
            decrypt_payload(&key, &key.iv(), &b64, None),
            Err(TrustError::MalformedEnvelope(_))
        ));
    }
}
