//! Cryptographic operation benchmarks
//!
//! These benchmarks measure the operations on the hot path of every push
//! message, signed request and webhook.
//!
//! Run with: `cargo bench --bench crypto_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use wechat_trust_lib::aead;
use wechat_trust_lib::certificates::CertificateSet;
use wechat_trust_lib::config::AppIdentity;
use wechat_trust_lib::message_crypto::MessageCrypto;
use wechat_trust_lib::signing::{self, keys::load_private_key, RequestSigner};
use wechat_trust_lib::webhook::{self, WebhookHeaders};

const MERCHANT_KEY_PEM: &str = include_str!("../tests/fixtures/merchant_key.pem");
const PLATFORM_KEY_PEM: &str = include_str!("../tests/fixtures/platform_key_a.pem");
const PLATFORM_CERT_PEM: &str = include_str!("../tests/fixtures/platform_cert_a.pem");
const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
const API_V3_KEY: &[u8; 32] = b"a7cde1ZJB1kG2e7VfTs3jQzaWizur8Gb";

fn message_crypto() -> MessageCrypto {
    let identity = AppIdentity::new("wxb11529c136998cb6", "secret")
        .with_token("pamtest")
        .with_encoding_aes_key("abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG");
    MessageCrypto::new(identity).unwrap()
}

/// Benchmark push-message encryption at typical message sizes
fn bench_message_encrypt(c: &mut Criterion) {
    let crypto = message_crypto();
    let mut group = c.benchmark_group("message_encrypt");

    for size in [256usize, 2048, 16384] {
        let plaintext = "x".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{}_bytes", size), |b| {
            b.iter(|| {
                let signed = crypto.encrypt(black_box(&plaintext), "1409304348", "xxxxxx").unwrap();
                black_box(signed)
            })
        });
    }

    group.finish();
}

/// Benchmark push-message verification and decryption
fn bench_message_decrypt(c: &mut Criterion) {
    let crypto = message_crypto();
    let signed = crypto
        .encrypt(&"<xml><Content><![CDATA[hello]]></Content></xml>".repeat(32), "1409304348", "xxxxxx")
        .unwrap();

    c.bench_function("message_decrypt", |b| {
        b.iter(|| {
            let plaintext = crypto.decrypt(black_box(&signed)).unwrap();
            black_box(plaintext)
        })
    });
}

/// Benchmark RSA-SHA256 request signing
fn bench_request_signing(c: &mut Criterion) {
    let key = load_private_key(MERCHANT_KEY_PEM).unwrap();
    let signer = RequestSigner::new("1900009191", "3775B6A45ACD588826D15E583A95F5DD0EF1A1C3", key);
    let body = r#"{"appid":"wxd678efh567hg6787","mchid":"1900009191","description":"Image形象店-深圳腾大-QQ公仔","out_trade_no":"1217752501201407033233368018","amount":{"total":100,"currency":"CNY"}}"#;

    c.bench_function("request_sign", |b| {
        b.iter(|| {
            let signed = signer
                .sign_request_at("POST", "/v3/pay/transactions/jsapi", Some(black_box(body)), 1554208460, "593BEC0C930BF1AFEB40B4A08C8FB242")
                .unwrap();
            black_box(signed)
        })
    });
}

/// Benchmark webhook verification (RSA verify + AES-256-GCM decrypt)
fn bench_webhook_verify(c: &mut Criterion) {
    let certificates = CertificateSet::from_pems([PLATFORM_CERT_PEM]).unwrap();
    let resource = aead::encrypt_resource(API_V3_KEY, "transaction", r#"{"trade_state":"SUCCESS"}"#).unwrap();
    let body = serde_json::json!({
        "id": "EV-2018022511223320873",
        "create_time": "2015-05-20T13:29:35+08:00",
        "resource_type": "encrypt-resource",
        "event_type": "TRANSACTION.SUCCESS",
        "summary": "payment succeeded",
        "resource": resource,
    })
    .to_string();

    let key = load_private_key(PLATFORM_KEY_PEM).unwrap();
    let signature = signing::sign(&signing::message(&["1554208460", "nonce", &body]), &key).unwrap();
    let headers = WebhookHeaders::from_pairs([
        (webhook::HEADER_SIGNATURE, signature),
        (webhook::HEADER_SERIAL, PLATFORM_SERIAL.to_string()),
        (webhook::HEADER_TIMESTAMP, "1554208460".to_string()),
        (webhook::HEADER_NONCE, "nonce".to_string()),
    ]);

    c.bench_function("webhook_verify", |b| {
        b.iter(|| {
            let verified = webhook::verify_notification(&headers, black_box(&body), &certificates, API_V3_KEY, None).unwrap();
            black_box(verified)
        })
    });
}

criterion_group!(
    crypto_benches,
    bench_message_encrypt,
    bench_message_decrypt,
    bench_request_signing,
    bench_webhook_verify,
);

criterion_main!(crypto_benches);
