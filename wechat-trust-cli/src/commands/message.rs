//! Encrypt and decrypt commands - push-message wire format

use anyhow::{Context, Result};
use wechat_trust_lib::message_crypto::{CallbackQuery, MessageCrypto, SignedEnvelope};
use wechat_trust_lib::nonce::{create_nonce_str, unix_timestamp, NONCE_DEFAULT_LEN};

use super::{read_input, AppArgs};

/// Encrypt a message and print the `<xml>` body.
pub fn encrypt(app: &AppArgs, input: &str, timestamp: Option<String>, nonce: Option<String>) -> Result<()> {
    let crypto = MessageCrypto::new(app.identity()).context("invalid app identity")?;
    let plaintext = read_input(input)?;

    let timestamp = timestamp.unwrap_or_else(|| unix_timestamp().to_string());
    let nonce = nonce.unwrap_or_else(|| create_nonce_str(NONCE_DEFAULT_LEN));

    let xml = crypto.encrypt_message(&plaintext, &timestamp, &nonce)?;
    println!("{}", xml);
    Ok(())
}

/// Verify and decrypt a message, printing the plaintext.
///
/// Query parameters that are not given fall back to the body's own fields.
pub fn decrypt(
    app: &AppArgs,
    input: &str,
    msg_signature: Option<String>,
    timestamp: Option<String>,
    nonce: Option<String>,
) -> Result<()> {
    let crypto = MessageCrypto::new(app.identity()).context("invalid app identity")?;
    let body = read_input(input)?;

    let plaintext = match (timestamp, nonce) {
        (Some(timestamp), Some(nonce)) => {
            let query = CallbackQuery {
                timestamp,
                nonce,
                msg_signature,
                encrypt_type: Some("aes".into()),
                ..Default::default()
            };
            crypto.decrypt_callback(&query, &body)?
        }
        _ => {
            let mut signed = SignedEnvelope::from_xml(&body)?;
            if let Some(signature) = msg_signature {
                signed.signature = signature;
            }
            crypto.decrypt(&signed)?
        }
    };

    tracing::debug!(bytes = plaintext.len(), "message decrypted");
    println!("{}", plaintext);
    Ok(())
}
