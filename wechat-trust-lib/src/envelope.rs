//! Binary envelope wrapped around push-message payloads before encryption.
//!
//! # Wire Format
//!
//! ```text
//! [16 bytes random][4 bytes payload length, big-endian][payload][identity tag]
//! ```
//!
//! The identity tag is the app id (or suite/component id) the message belongs
//! to and runs to the end of the buffer. Block padding is applied by the
//! cipher to the whole envelope, not here.

use rand::RngCore;

use crate::{Result, TrustError};

/// Length of the random prefix.
pub const RANDOM_PAD_LEN: usize = 16;

/// Length of the big-endian payload length field.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Smallest possible envelope: random prefix plus length field.
pub const HEADER_LEN: usize = RANDOM_PAD_LEN + LENGTH_PREFIX_LEN;

/// A decoded envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Message payload.
    pub payload: Vec<u8>,
    /// Identity tag (trailing bytes).
    pub identity: Vec<u8>,
}

impl Envelope {
    /// Identity tag as text, replacing invalid UTF-8.
    pub fn identity_lossy(&self) -> String {
        String::from_utf8_lossy(&self.identity).into_owned()
    }
}

/// Encode `payload` and `identity` with a fresh random prefix.
pub fn encode(payload: &[u8], identity: &[u8]) -> Result<Vec<u8>> {
    let mut random = [0u8; RANDOM_PAD_LEN];
    rand::thread_rng().fill_bytes(&mut random);
    encode_with_prefix(random, payload, identity)
}

/// Encode with a caller-supplied random prefix.
///
/// Only useful for reproducible vectors; production code uses [`encode`].
pub fn encode_with_prefix(
    random: [u8; RANDOM_PAD_LEN],
    payload: &[u8],
    identity: &[u8],
) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        TrustError::MalformedEnvelope(format!("payload of {} bytes too large", payload.len()))
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + identity.len());
    out.extend_from_slice(&random);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(identity);
    Ok(out)
}

/// Decode an envelope, checking the identity tag when `expected_identity` is given.
///
/// # Errors
///
/// - `MalformedEnvelope` if the buffer is shorter than `16 + 4 + L`
/// - `IdentityMismatch` if the trailing tag differs from `expected_identity`
pub fn decode(buf: &[u8], expected_identity: Option<&str>) -> Result<Envelope> {
    if buf.len() < HEADER_LEN {
        return Err(TrustError::MalformedEnvelope(format!(
            "envelope of {} bytes is shorter than the {}-byte header",
            buf.len(),
            HEADER_LEN
        )));
    }

    let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
    len_bytes.copy_from_slice(&buf[RANDOM_PAD_LEN..HEADER_LEN]);
    let payload_len = u32::from_be_bytes(len_bytes) as usize;

    let payload_end = HEADER_LEN
        .checked_add(payload_len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| {
            TrustError::MalformedEnvelope(format!(
                "declared payload length {} exceeds remaining {} bytes",
                payload_len,
                buf.len() - HEADER_LEN
            ))
        })?;

    let envelope = Envelope {
        payload: buf[HEADER_LEN..payload_end].to_vec(),
        identity: buf[payload_end..].to_vec(),
    };

    if let Some(expected) = expected_identity {
        if envelope.identity != expected.as_bytes() {
            return Err(TrustError::IdentityMismatch {
                expected: expected.to_string(),
                found: envelope.identity_lossy(),
            });
        }
    }

    Ok(envelope)
}
