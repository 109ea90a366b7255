//! Test utilities for the trust layer.
//!
//! This module provides:
//! - Fixture keys and certificates
//! - A mock [`PlatformApi`](crate::client::PlatformApi)
//! - Builders for sealed certificate listings and signed notifications
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wechat_trust_lib::test_utils::{signed_notification, fixtures};
//!
//! let (headers, body) = signed_notification(r#"{"trade_state":"SUCCESS"}"#);
//! ```

pub mod fixtures;
mod mock_platform;

pub use mock_platform::MockPlatformApi;

use crate::aead::{self, EncryptedResource};
use crate::certificates::{parse_certificate, CertificateEntry};
use crate::nonce::{create_nonce_str, unix_timestamp};
use crate::signing::{self, keys::load_private_key, RequestSigner};
use crate::webhook::{WebhookHeaders, HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP};

/// APIv3 key used for every sealed fixture.
pub const API_V3_KEY: &[u8; 32] = b"a7cde1ZJB1kG2e7VfTs3jQzaWizur8Gb";

/// Signer for the fixture merchant.
///
/// # Panics
/// Panics if the fixture key is unreadable.
pub fn merchant_signer() -> RequestSigner {
    let key = load_private_key(fixtures::MERCHANT_KEY_PEM).expect("fixture merchant key");
    RequestSigner::new(fixtures::MCH_ID, fixtures::MERCHANT_SERIAL, key)
}

/// Seal a PEM certificate into a listing entry with [`API_V3_KEY`].
///
/// # Panics
/// Panics if the PEM is not a valid certificate.
pub fn seal_certificate(pem: &str) -> CertificateEntry {
    let certificate = parse_certificate(pem).expect("fixture certificate");
    CertificateEntry {
        serial_no: certificate.serial_no.clone(),
        effective_time: Some(certificate.effective_time),
        expire_time: Some(certificate.expire_time),
        encrypt_certificate: aead::encrypt_resource(API_V3_KEY, "certificate", pem).expect("seal certificate"),
    }
}

/// A notification carrying `payload`, signed with platform key A.
pub fn signed_notification(payload: &str) -> (WebhookHeaders, String) {
    signed_notification_with(fixtures::PLATFORM_A_KEY_PEM, fixtures::PLATFORM_A_SERIAL, payload)
}

/// A notification carrying `payload`, signed with `key_pem` under `serial`.
///
/// # Panics
/// Panics if the key cannot be loaded or used.
pub fn signed_notification_with(key_pem: &str, serial: &str, payload: &str) -> (WebhookHeaders, String) {
    let mut resource = aead::encrypt_resource(API_V3_KEY, "transaction", payload).expect("seal resource");
    resource.original_type = Some("transaction".into());
    signed_resource_notification(resource, key_pem, serial)
}

/// A notification carrying an already sealed `resource`, signed with
/// `key_pem` under `serial`.
///
/// # Panics
/// Panics if the key cannot be loaded or used.
pub fn signed_resource_notification(resource: EncryptedResource, key_pem: &str, serial: &str) -> (WebhookHeaders, String) {
    let body = serde_json::json!({
        "id": "EV-2018022511223320873",
        "create_time": "2015-05-20T13:29:35+08:00",
        "resource_type": "encrypt-resource",
        "event_type": "TRANSACTION.SUCCESS",
        "summary": "payment succeeded",
        "resource": resource,
    })
    .to_string();

    let timestamp = unix_timestamp().to_string();
    let nonce = create_nonce_str(32);
    let key = load_private_key(key_pem).expect("fixture platform key");
    let signature = signing::sign(&signing::message(&[&timestamp, &nonce, &body]), &key).expect("sign notification");

    let headers = WebhookHeaders::from_pairs([
        (HEADER_SIGNATURE, signature),
        (HEADER_SERIAL, serial.to_string()),
        (HEADER_TIMESTAMP, timestamp),
        (HEADER_NONCE, nonce),
    ]);
    (headers, body)
}
