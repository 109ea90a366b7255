//! Platform API calls needed by the trust layer.
//!
//! [`PlatformApi`] is the seam between credential refresh and the network:
//! the token service and the certificate store only ever talk to this trait.
//! [`HttpPlatformClient`] implements it over `reqwest` when the
//! `http-client` feature is enabled.

#[cfg(feature = "http-client")]
mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::certificates::CertificateListResponse;
use crate::credentials::IssuedCredential;
use crate::signing::RequestSigner;
use crate::{Result, TrustError};

#[cfg(feature = "http-client")]
pub use http::HttpPlatformClient;

/// Remote operations behind credential refreshes.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// `GET /cgi-bin/token` for an official account or mini program.
    async fn fetch_access_token(&self, app_id: &str, secret: &str) -> Result<IssuedCredential>;

    /// `GET /cgi-bin/ticket/getticket?type=jsapi`.
    async fn fetch_jsapi_ticket(&self, access_token: &str) -> Result<IssuedCredential>;

    /// Signed `GET /v3/certificates` for a merchant.
    async fn fetch_certificates(&self, signer: &RequestSigner) -> Result<CertificateListResponse>;

    /// `POST /cgi-bin/component/api_component_token` for a third-party
    /// platform, trading the latest verify ticket for an access token.
    async fn fetch_component_access_token(
        &self,
        component_app_id: &str,
        component_secret: &str,
        verify_ticket: &str,
    ) -> Result<IssuedCredential>;

    /// `POST /cgi-bin/component/api_start_push_ticket`.
    async fn start_push_ticket(&self, component_app_id: &str, component_secret: &str) -> Result<()>;
}

/// Error envelope shared by the official account APIs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlatformStatus {
    /// Zero on success.
    #[serde(default)]
    pub errcode: i64,
    /// Human-readable message, may end with `rid: <request id>`.
    #[serde(default)]
    pub errmsg: String,
}

impl PlatformStatus {
    /// `Platform` error when `errcode` is non-zero.
    pub fn check(&self) -> Result<()> {
        if self.errcode == 0 {
            return Ok(());
        }
        let err = TrustError::Platform {
            errcode: self.errcode,
            errmsg: self.errmsg.clone(),
        };
        tracing::warn!(errcode = self.errcode, rid = ?err.platform_rid(), "platform call rejected");
        Err(err)
    }
}

/// Body of `GET /cgi-bin/token`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    /// Error code and message.
    #[serde(flatten)]
    pub status: PlatformStatus,
    /// The access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl AccessTokenResponse {
    /// Convert into an issued credential, surfacing platform errors.
    pub fn into_issued(self) -> Result<IssuedCredential> {
        self.status.check()?;
        let token = self
            .access_token
            .ok_or_else(|| TrustError::invalid_data("access_token", "missing from response"))?;
        Ok(IssuedCredential::new(token, lifetime(self.expires_in)))
    }
}

/// Body of `GET /cgi-bin/ticket/getticket`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TicketResponse {
    /// Error code and message.
    #[serde(flatten)]
    pub status: PlatformStatus,
    /// The ticket.
    #[serde(default)]
    pub ticket: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TicketResponse {
    /// Convert into an issued credential, surfacing platform errors.
    pub fn into_issued(self) -> Result<IssuedCredential> {
        self.status.check()?;
        let ticket = self
            .ticket
            .ok_or_else(|| TrustError::invalid_data("ticket", "missing from response"))?;
        Ok(IssuedCredential::new(ticket, lifetime(self.expires_in)))
    }
}

/// Body of `POST /cgi-bin/component/api_component_token`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComponentTokenResponse {
    /// Error code and message.
    #[serde(flatten)]
    pub status: PlatformStatus,
    /// The component access token.
    #[serde(default)]
    pub component_access_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl ComponentTokenResponse {
    /// Convert into an issued credential, surfacing platform errors.
    pub fn into_issued(self) -> Result<IssuedCredential> {
        self.status.check()?;
        let token = self
            .component_access_token
            .ok_or_else(|| TrustError::invalid_data("component_access_token", "missing from response"))?;
        Ok(IssuedCredential::new(token, lifetime(self.expires_in)))
    }
}

/// Error body of the pay APIv3.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PayErrorResponse {
    /// Symbolic code such as `SIGN_ERROR`.
    #[serde(default)]
    pub code: String,
    /// Description.
    #[serde(default)]
    pub message: String,
}

/// Tokens and tickets default to two hours when the platform omits a lifetime.
const DEFAULT_LIFETIME_SECS: u64 = 7200;

fn lifetime(expires_in: Option<u64>) -> Duration {
    Duration::from_secs(expires_in.unwrap_or(DEFAULT_LIFETIME_SECS))
}
