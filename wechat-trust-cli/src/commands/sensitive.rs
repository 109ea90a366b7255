//! Encrypt-field command - RSA-OAEP for sensitive request fields

use anyhow::{Context, Result};
use wechat_trust_lib::certificates::parse_certificate;
use wechat_trust_lib::sensitive;

use crate::ui;

/// Encrypt `value` for the certificate at `cert_path` and print the base64.
pub fn encrypt(cert_path: &str, value: &str) -> Result<()> {
    let pem = std::fs::read_to_string(cert_path).with_context(|| format!("reading {}", cert_path))?;
    let certificate = parse_certificate(&pem)?;

    let ciphertext = sensitive::encrypt(value, &certificate.public_key)?;
    ui::info(&format!("send with header Wechatpay-Serial: {}", certificate.serial_no));
    println!("{}", ciphertext);
    Ok(())
}
