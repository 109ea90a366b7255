//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use wechat_trust_lib::prelude::*;
//! ```

// Configuration
pub use crate::config::{AppIdentity, ClientConfig, MerchantConfig};

// Error handling
pub use crate::errors::{TrustError, TrustErrorCode};
pub use crate::Result;

// Push messages
pub use crate::message_crypto::{CallbackQuery, MessageCrypto, MessageKey, SignedEnvelope};

// Credentials
pub use crate::credentials::{
    Credential, CredentialCache, CredentialKey, CredentialKind, CredentialManager, InMemoryCredentialCache,
    NamespacedCache,
};
pub use crate::tokens::TokenService;
pub use crate::component::ComponentService;

// Pay APIv3
pub use crate::certificates::{CertificateSet, CertificateStore, PlatformCertificate};
pub use crate::signing::{RequestSigner, SignedRequest};
pub use crate::webhook::{DecryptedResource, WebhookHeaders, WebhookVerifier};

// Platform access
pub use crate::client::PlatformApi;

#[cfg(feature = "http-client")]
pub use crate::client::HttpPlatformClient;
