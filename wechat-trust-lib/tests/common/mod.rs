//! Shared helpers for integration tests.
//!
//! Built on the public API only, so the tests run without the
//! `test-utils` feature.

#![allow(dead_code)]

use std::sync::Arc;

use wechat_trust_lib::aead;
use wechat_trust_lib::certificates::{parse_certificate, CertificateEntry};
use wechat_trust_lib::credentials::{CredentialManager, InMemoryCredentialCache};
use wechat_trust_lib::nonce::{create_nonce_str, unix_timestamp};
use wechat_trust_lib::signing::{self, keys::load_private_key, RequestSigner};
use wechat_trust_lib::webhook::{WebhookHeaders, HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP};

pub const MERCHANT_KEY_PEM: &str = include_str!("../fixtures/merchant_key.pem");
pub const MERCHANT_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD0EF1A1C3";
pub const MCH_ID: &str = "1900009191";

pub const PLATFORM_A_KEY_PEM: &str = include_str!("../fixtures/platform_key_a.pem");
pub const PLATFORM_A_CERT_PEM: &str = include_str!("../fixtures/platform_cert_a.pem");
pub const PLATFORM_A_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";

pub const PLATFORM_B_KEY_PEM: &str = include_str!("../fixtures/platform_key_b.pem");
pub const PLATFORM_B_CERT_PEM: &str = include_str!("../fixtures/platform_cert_b.pem");
pub const PLATFORM_B_SERIAL: &str = "7132D72A03E93CDDF8C03BBD1F37EEDF204FA102";

pub const API_V3_KEY: &[u8; 32] = b"a7cde1ZJB1kG2e7VfTs3jQzaWizur8Gb";

pub const APP_ID: &str = "wxb11529c136998cb6";
pub const TOKEN: &str = "pamtest";
pub const ENCODING_AES_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

pub fn merchant_signer() -> RequestSigner {
    let key = load_private_key(MERCHANT_KEY_PEM).expect("merchant key");
    RequestSigner::new(MCH_ID, MERCHANT_SERIAL, key)
}

pub fn credential_manager() -> Arc<CredentialManager> {
    Arc::new(CredentialManager::new(Arc::new(InMemoryCredentialCache::new())))
}

pub fn seal_certificate(pem: &str) -> CertificateEntry {
    let certificate = parse_certificate(pem).expect("certificate");
    CertificateEntry {
        serial_no: certificate.serial_no.clone(),
        effective_time: Some(certificate.effective_time),
        expire_time: Some(certificate.expire_time),
        encrypt_certificate: aead::encrypt_resource(API_V3_KEY, "certificate", pem).expect("seal"),
    }
}

/// JSON body of a `/v3/certificates` response serving `pems`.
pub fn certificate_listing(pems: &[&str]) -> serde_json::Value {
    let data: Vec<CertificateEntry> = pems.iter().map(|pem| seal_certificate(pem)).collect();
    serde_json::json!({ "data": data })
}

pub fn signed_notification(key_pem: &str, serial: &str, payload: &str) -> (WebhookHeaders, String) {
    let mut resource = aead::encrypt_resource(API_V3_KEY, "transaction", payload).expect("seal resource");
    resource.original_type = Some("transaction".into());

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
    let key = load_private_key(key_pem).expect("platform key");
    let signature = signing::sign(&signing::message(&[&timestamp, &nonce, &body]), &key).expect("sign");

    let headers = WebhookHeaders::from_pairs([
        (HEADER_SIGNATURE, signature),
        (HEADER_SERIAL, serial.to_string()),
        (HEADER_TIMESTAMP, timestamp),
        (HEADER_NONCE, nonce),
    ]);
    (headers, body)
}
