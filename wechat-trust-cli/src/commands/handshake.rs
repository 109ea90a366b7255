//! Handshake command - answer a server URL verification

use anyhow::{bail, Result};
use wechat_trust_lib::message_crypto::{handshake_response, CallbackQuery, HANDSHAKE_FAIL};

/// Print the handshake response; fails when the signature is rejected.
pub fn run(token: &str, signature: &str, timestamp: &str, nonce: &str, echostr: &str) -> Result<()> {
    let query = CallbackQuery {
        signature: signature.to_string(),
        timestamp: timestamp.to_string(),
        nonce: nonce.to_string(),
        echostr: Some(echostr.to_string()),
        ..Default::default()
    };

    let response = handshake_response(token, &query);
    println!("{}", response);

    if response == HANDSHAKE_FAIL {
        bail!("handshake signature rejected");
    }
    Ok(())
}
