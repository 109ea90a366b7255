//! Verify-webhook command - offline notification verification

use std::time::Duration;

use anyhow::{Context, Result};
use wechat_trust_lib::certificates::CertificateSet;
use wechat_trust_lib::webhook::{self, DecryptedResource, WebhookHeaders};

use super::read_input;
use crate::ui;

/// The four `Wechatpay-*` headers of a notification.
#[derive(Debug)]
pub struct HeaderArgs {
    /// `Wechatpay-Signature`, base64.
    pub signature: String,
    /// `Wechatpay-Serial`, serial of the signing certificate.
    pub serial: String,
    /// `Wechatpay-Timestamp`, unix seconds.
    pub timestamp: String,
    /// `Wechatpay-Nonce`.
    pub nonce: String,
}

impl HeaderArgs {
    fn into_headers(self) -> WebhookHeaders {
        WebhookHeaders::from_pairs([
            (webhook::HEADER_SIGNATURE, self.signature),
            (webhook::HEADER_SERIAL, self.serial),
            (webhook::HEADER_TIMESTAMP, self.timestamp),
            (webhook::HEADER_NONCE, self.nonce),
        ])
    }
}

/// Verify a notification body and print its decrypted resource.
pub fn run(cert_paths: &[String], api_v3_key: &str, headers: HeaderArgs, input: &str, max_skew: Option<u64>) -> Result<()> {
    let pems = cert_paths
        .iter()
        .map(|path| std::fs::read_to_string(path).with_context(|| format!("reading {}", path)))
        .collect::<Result<Vec<_>>>()?;
    let certificates = CertificateSet::from_pems(pems.iter().map(String::as_str))?;
    let body = read_input(input)?;

    let verified = webhook::verify_notification(
        &headers.into_headers(),
        &body,
        &certificates,
        api_v3_key.as_bytes(),
        max_skew.map(Duration::from_secs),
    )?;

    ui::success(&format!("signature verified with certificate {}", verified.serial_no));
    ui::header("Notification");
    ui::key_value("ID", &verified.notification.id);
    ui::key_value("Event", &verified.notification.event_type);
    ui::key_value("Created", verified.notification.create_time.as_deref().unwrap_or("-"));
    ui::separator();

    match &verified.resource {
        DecryptedResource::Json(value) => ui::json(value),
        DecryptedResource::Text(text) => println!("{}", text),
    }
    Ok(())
}
