//! CLI command implementations

pub mod certificates;
pub mod handshake;
pub mod jssdk;
pub mod message;
pub mod sensitive;
pub mod sign;
pub mod webhook;

use std::io::Read;

use anyhow::Context;
use clap::Args;
use wechat_trust_lib::config::AppIdentity;
use wechat_trust_lib::signing::{keys::read_private_key, RequestSigner};

/// Official account identity for push-message commands.
#[derive(Args, Debug)]
pub struct AppArgs {
    /// App id the messages are addressed to
    #[arg(long, env = "WECHAT_APP_ID")]
    pub app_id: String,

    /// Callback token
    #[arg(long, env = "WECHAT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// 43-character EncodingAESKey
    #[arg(long, env = "WECHAT_ENCODING_AES_KEY", hide_env_values = true)]
    pub encoding_aes_key: String,
}

impl AppArgs {
    /// Build the identity; the app secret is not needed for message crypto.
    pub fn identity(&self) -> AppIdentity {
        AppIdentity::new(self.app_id.as_str(), "")
            .with_token(self.token.as_str())
            .with_encoding_aes_key(self.encoding_aes_key.as_str())
    }
}

/// Merchant credentials for pay API commands.
#[derive(Args, Debug)]
pub struct MerchantArgs {
    /// Merchant id
    #[arg(long, env = "WECHATPAY_MCH_ID")]
    pub mch_id: String,

    /// Serial number of the merchant API certificate
    #[arg(long, env = "WECHATPAY_SERIAL_NO")]
    pub serial_no: String,

    /// Path to the merchant private key (PEM)
    #[arg(long, env = "WECHATPAY_PRIVATE_KEY_PATH")]
    pub private_key: String,
}

impl MerchantArgs {
    /// Load the private key and build a signer.
    pub fn signer(&self) -> anyhow::Result<RequestSigner> {
        let key = read_private_key(&self.private_key)
            .with_context(|| format!("loading merchant key from {}", self.private_key))?;
        Ok(RequestSigner::new(self.mch_id.as_str(), self.serial_no.as_str(), key))
    }
}

/// Read a file, or stdin when `path` is `-`.
pub fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.xml");
        std::fs::write(&path, "<xml></xml>").unwrap();

        let content = read_input(path.to_str().unwrap()).unwrap();
        assert_eq!(content, "<xml></xml>");
    }

    #[test]
    fn test_read_input_missing_file() {
        let err = read_input("/nonexistent/body.xml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/body.xml"));
    }

    #[test]
    fn test_app_identity() {
        let args = AppArgs {
            app_id: "wxb11529c136998cb6".into(),
            token: "pamtest".into(),
            encoding_aes_key: "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG".into(),
        };
        let identity = args.identity();
        assert_eq!(identity.app_id, "wxb11529c136998cb6");
        assert!(identity.message_key().is_ok());
    }
}
