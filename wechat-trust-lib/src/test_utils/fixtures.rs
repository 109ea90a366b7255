//! Fixture keys and certificates.
//!
//! Self-signed RSA-2048 material generated with OpenSSL; never use outside
//! tests.

/// Merchant private key (PKCS#8).
pub const MERCHANT_KEY_PEM: &str = include_str!("../../tests/fixtures/merchant_key.pem");

/// Serial number used for the merchant certificate in signed requests.
pub const MERCHANT_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD0EF1A1C3";

/// Merchant id used throughout the tests.
pub const MCH_ID: &str = "1900009191";

/// First platform key pair.
pub const PLATFORM_A_KEY_PEM: &str = include_str!("../../tests/fixtures/platform_key_a.pem");
pub const PLATFORM_A_CERT_PEM: &str = include_str!("../../tests/fixtures/platform_cert_a.pem");
pub const PLATFORM_A_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";

/// Second platform key pair, used for rotation scenarios.
pub const PLATFORM_B_KEY_PEM: &str = include_str!("../../tests/fixtures/platform_key_b.pem");
pub const PLATFORM_B_CERT_PEM: &str = include_str!("../../tests/fixtures/platform_cert_b.pem");
pub const PLATFORM_B_SERIAL: &str = "7132D72A03E93CDDF8C03BBD1F37EEDF204FA102";

/// 43-character message key of the official account used in examples.
pub const ENCODING_AES_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

/// App id matching [`ENCODING_AES_KEY`].
pub const APP_ID: &str = "wxb11529c136998cb6";

/// Callback token matching [`ENCODING_AES_KEY`].
pub const TOKEN: &str = "pamtest";
