//! Access tokens, JS-SDK tickets and URL signatures for one app.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::client::PlatformApi;
use crate::config::AppIdentity;
use crate::credentials::{CredentialKey, CredentialKind, CredentialManager};
use crate::nonce::{create_nonce_str, unix_timestamp, NONCE_DEFAULT_LEN};
use crate::Result;

/// Parameters for `wx.config` on a JS-SDK page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsSdkSignature {
    /// App id the page is configured for.
    pub app_id: String,
    /// Unix timestamp included in the signature.
    pub timestamp: i64,
    /// Nonce included in the signature.
    pub nonce_str: String,
    /// Hex SHA-1 over ticket, nonce, timestamp and URL.
    pub signature: String,
}

/// SHA-1 signature of a page URL for the JS-SDK.
///
/// Anything after `#` in `url` is not part of the signed URL.
pub fn sign_jssdk_url(ticket: &str, nonce: &str, timestamp: i64, url: &str) -> String {
    let url = url.split('#').next().unwrap_or(url);
    let plain = format!(
        "jsapi_ticket={}&noncestr={}&timestamp={}&url={}",
        ticket, nonce, timestamp, url
    );
    hex::encode(Sha1::digest(plain.as_bytes()))
}

/// Hands out cached access tokens and tickets for one app identity.
pub struct TokenService {
    identity: AppIdentity,
    api: Arc<dyn PlatformApi>,
    credentials: Arc<CredentialManager>,
}

impl TokenService {
    /// Create a service for `identity`.
    pub fn new(identity: AppIdentity, api: Arc<dyn PlatformApi>, credentials: Arc<CredentialManager>) -> Self {
        Self {
            identity,
            api,
            credentials,
        }
    }

    /// The app identity served.
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    fn key(&self, kind: CredentialKind) -> CredentialKey {
        CredentialKey::new(self.identity.app_id.as_str(), kind)
    }

    /// A fresh access token.
    pub async fn access_token(&self) -> Result<String> {
        let key = self.key(CredentialKind::AccessToken);
        let credential = self
            .credentials
            .get_or_refresh(&key, move || {
                self.api
                    .fetch_access_token(&self.identity.app_id, &self.identity.secret)
            })
            .await?;
        Ok(credential.value)
    }

    /// A fresh JS-SDK ticket, fetching an access token first if needed.
    pub async fn jsapi_ticket(&self) -> Result<String> {
        let key = self.key(CredentialKind::JsapiTicket);
        let credential = self
            .credentials
            .get_or_refresh(&key, move || async move {
                let token = self.access_token().await?;
                self.api.fetch_jsapi_ticket(&token).await
            })
            .await?;
        Ok(credential.value)
    }

    /// Drop the cached access token, e.g. after the platform rejected it
    /// with errcode 40001.
    pub async fn invalidate_access_token(&self) -> Result<bool> {
        self.credentials.invalidate(&self.key(CredentialKind::AccessToken)).await
    }

    /// Sign a page URL for `wx.config`.
    pub async fn jssdk_signature(&self, url: &str) -> Result<JsSdkSignature> {
        let ticket = self.jsapi_ticket().await?;
        let timestamp = unix_timestamp();
        let nonce_str = create_nonce_str(NONCE_DEFAULT_LEN);
        let signature = sign_jssdk_url(&ticket, &nonce_str, timestamp, url);
        Ok(JsSdkSignature {
            app_id: self.identity.app_id.clone(),
            timestamp,
            nonce_str,
            signature,
        })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("app_id", &self.identity.app_id)
            .finish_non_exhaustive()
    }
}
