//! Trust layer for the WeChat open platform.
//!
//! Everything that decides whether a message from or to the platform can be
//! trusted lives here:
//!
//! - **Push messages**: AES-256-CBC envelope cipher with SHA-1 signatures
//!   ([`message_crypto`]) and the server URL handshake
//! - **Pay APIv3 requests**: RSA-SHA256 signatures and `Authorization`
//!   headers ([`signing`])
//! - **Platform certificates**: download, AES-256-GCM decryption, X.509
//!   parsing ([`certificates`])
//! - **Webhooks**: signature verification and payload decryption
//!   ([`webhook`])
//! - **Sensitive fields**: RSA-OAEP ([`sensitive`])
//! - **Credentials**: cached access tokens, tickets and certificate sets
//!   with single-flight refresh ([`credentials`], [`tokens`])
//! - **Third-party platforms**: pushed verify tickets and component access
//!   tokens ([`component`])
//!
//! The crate holds no global state: caches and HTTP clients are passed in
//! through the [`credentials::CredentialCache`] and [`client::PlatformApi`]
//! traits.
//!
//! # Example
//!
//! ```
//! use wechat_trust_lib::prelude::*;
//!
//! let identity = AppIdentity::new("wxb11529c136998cb6", "secret")
//!     .with_token("pamtest")
//!     .with_encoding_aes_key("abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG");
//! let crypto = MessageCrypto::new(identity).unwrap();
//!
//! let xml = crypto.encrypt_message("<xml>hi</xml>", "1409304348", "xxxxxx").unwrap();
//! assert_eq!(crypto.decrypt_xml(&xml).unwrap(), "<xml>hi</xml>");
//! ```

pub mod aead;
pub mod certificates;
pub mod client;
pub mod component;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod errors;
pub mod message_crypto;
pub mod nonce;
pub mod prelude;
pub mod sensitive;
pub mod signing;
pub mod tokens;
pub mod webhook;

/// Test utilities: fixture keys, a mock platform, signed notifications.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use errors::{TrustError, TrustErrorCode};

/// Common result alias for trust-layer operations.
pub type Result<T> = std::result::Result<T, TrustError>;
