//! Account and client configuration.
//!
//! # Environment Variables
//!
//! ## Official account / open platform app
//! - `WECHAT_APP_ID` - App id, also the identity tag inside encrypted messages
//! - `WECHAT_APP_SECRET` - App secret used to obtain access tokens
//! - `WECHAT_TOKEN` - Token configured for push-message signatures
//! - `WECHAT_ENCODING_AES_KEY` - 43-character message encryption key
//!
//! ## WeChat Pay merchant
//! - `WECHATPAY_MCH_ID` - Merchant id
//! - `WECHATPAY_SERIAL_NO` - Serial number of the merchant API certificate
//! - `WECHATPAY_PRIVATE_KEY_PATH` - Path to the merchant private key (PEM)
//! - `WECHATPAY_PRIVATE_KEY` - Inline PEM, used when no path is set
//! - `WECHATPAY_API_V3_KEY` - 32-byte APIv3 key
//!
//! ## Endpoints
//! - `WECHAT_API_BASE_URL`, `WECHATPAY_API_BASE_URL`, `WECHAT_HTTP_TIMEOUT`

use std::fmt;

use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::message_crypto::MessageKey;
use crate::signing::keys::load_private_key;
use crate::{Result, TrustError};

/// Default official account / open platform API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.weixin.qq.com";

/// Default WeChat Pay API base URL.
pub const DEFAULT_PAY_BASE_URL: &str = "https://api.mch.weixin.qq.com";

/// Credentials of one official account or open-platform app.
///
/// Several identities may coexist in one process; each one carries its own
/// token and message key.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AppIdentity {
    /// App id (also the identity tag of encrypted messages).
    pub app_id: String,
    /// App secret.
    #[serde(default)]
    pub secret: String,
    /// Token used for message and handshake signatures.
    #[serde(default)]
    pub token: String,
    /// 43-character base64 message key (`EncodingAESKey`).
    #[serde(default)]
    pub encoding_aes_key: String,
}

impl AppIdentity {
    /// Create an identity with an app id and secret.
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            token: String::new(),
            encoding_aes_key: String::new(),
        }
    }

    /// Set the message token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the message encryption key.
    pub fn with_encoding_aes_key(mut self, key: impl Into<String>) -> Self {
        self.encoding_aes_key = key.into();
        self
    }

    /// Derive the AES-256 message key from `encoding_aes_key`.
    pub fn message_key(&self) -> Result<MessageKey> {
        MessageKey::from_encoding_aes_key(&self.encoding_aes_key)
    }

    /// Load an identity from `WECHAT_*` environment variables.
    ///
    /// Returns `None` when `WECHAT_APP_ID` is not set.
    pub fn from_env() -> Option<Self> {
        let app_id = std::env::var("WECHAT_APP_ID").ok()?;
        let mut identity = Self::new(app_id, std::env::var("WECHAT_APP_SECRET").unwrap_or_default());

        if let Ok(token) = std::env::var("WECHAT_TOKEN") {
            identity = identity.with_token(token);
        }
        if let Ok(key) = std::env::var("WECHAT_ENCODING_AES_KEY") {
            identity = identity.with_encoding_aes_key(key);
        }

        Some(identity)
    }
}

impl fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppIdentity")
            .field("app_id", &self.app_id)
            .field("secret", &"<redacted>")
            .field("token", &"<redacted>")
            .field("encoding_aes_key", &"<redacted>")
            .finish()
    }
}

/// WeChat Pay merchant configuration.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MerchantConfig {
    /// Merchant id.
    pub mch_id: String,
    /// Serial number of the merchant API certificate.
    pub serial_no: String,
    /// Merchant private key, PEM encoded.
    pub private_key_pem: String,
    /// APIv3 key used for AES-256-GCM resources.
    pub api_v3_key: String,
}

impl MerchantConfig {
    /// Create a new merchant configuration.
    pub fn new(
        mch_id: impl Into<String>,
        serial_no: impl Into<String>,
        private_key_pem: impl Into<String>,
        api_v3_key: impl Into<String>,
    ) -> Self {
        Self {
            mch_id: mch_id.into(),
            serial_no: serial_no.into(),
            private_key_pem: private_key_pem.into(),
            api_v3_key: api_v3_key.into(),
        }
    }

    /// Parse the merchant private key.
    pub fn private_key(&self) -> Result<RsaPrivateKey> {
        load_private_key(&self.private_key_pem)
    }

    /// The APIv3 key as bytes, checked for the 32-byte AES-256 length.
    pub fn api_v3_key_bytes(&self) -> Result<&[u8]> {
        let key = self.api_v3_key.as_bytes();
        if key.len() != 32 {
            return Err(TrustError::InvalidKey(format!(
                "APIv3 key must be 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(key)
    }

    /// Load a merchant configuration from `WECHATPAY_*` environment variables.
    ///
    /// Returns `Ok(None)` when `WECHATPAY_MCH_ID` is not set, and an error
    /// when the merchant is configured but incomplete.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(mch_id) = std::env::var("WECHATPAY_MCH_ID") else {
            return Ok(None);
        };

        let serial_no = required_env("WECHATPAY_SERIAL_NO")?;
        let api_v3_key = required_env("WECHATPAY_API_V3_KEY")?;
        let private_key_pem = match std::env::var("WECHATPAY_PRIVATE_KEY_PATH") {
            Ok(path) => std::fs::read_to_string(&path).map_err(|e| {
                TrustError::invalid_data("WECHATPAY_PRIVATE_KEY_PATH", format!("{}: {}", path, e))
            })?,
            Err(_) => required_env("WECHATPAY_PRIVATE_KEY")?,
        };

        Ok(Some(Self::new(mch_id, serial_no, private_key_pem, api_v3_key)))
    }
}

impl fmt::Debug for MerchantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantConfig")
            .field("mch_id", &self.mch_id)
            .field("serial_no", &self.serial_no)
            .field("private_key_pem", &"<redacted>")
            .field("api_v3_key", &"<redacted>")
            .finish()
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| TrustError::invalid_data(name, "environment variable not set"))
}

/// HTTP client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Official account API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// WeChat Pay API base URL.
    #[serde(default = "default_pay_base_url")]
    pub pay_base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_pay_base_url() -> String {
    DEFAULT_PAY_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            pay_base_url: default_pay_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ClientConfig {
    /// Point both APIs at a single base URL (mock servers, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_base_url = url.clone();
        self.pay_base_url = url;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Load endpoint overrides from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("WECHAT_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = std::env::var("WECHATPAY_API_BASE_URL") {
            config.pay_base_url = url;
        }
        if let Ok(timeout) = std::env::var("WECHAT_HTTP_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                config = config.with_timeout(secs);
            }
        }

        config
    }
}
