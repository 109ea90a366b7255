//! `reqwest` implementation of [`PlatformApi`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{AccessTokenResponse, ComponentTokenResponse, PayErrorResponse, PlatformApi, PlatformStatus, TicketResponse};
use crate::certificates::{CertificateListResponse, CERTIFICATES_PATH};
use crate::config::ClientConfig;
use crate::credentials::IssuedCredential;
use crate::signing::RequestSigner;
use crate::{Result, TrustError};

const USER_AGENT: &str = concat!("wechat-trust/", env!("CARGO_PKG_VERSION"));

const COMPONENT_TOKEN_PATH: &str = "/cgi-bin/component/api_component_token";
const START_PUSH_TICKET_PATH: &str = "/cgi-bin/component/api_start_push_ticket";

#[derive(Serialize)]
struct ComponentTokenRequest<'a> {
    component_appid: &'a str,
    component_appsecret: &'a str,
    component_verify_ticket: &'a str,
}

#[derive(Serialize)]
struct StartPushTicketRequest<'a> {
    component_appid: &'a str,
    component_secret: &'a str,
}

/// HTTP client for the official account and pay APIs.
///
/// Secrets appear in token request URLs, so URLs are never logged; only
/// paths and status codes are.
#[derive(Clone, Debug)]
pub struct HttpPlatformClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl HttpPlatformClient {
    /// Create a client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TrustError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create a client against the production endpoints.
    pub fn production() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, path: &str) -> Result<T> {
        let response = request.send().await.map_err(|e| self.map_reqwest_error(e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TrustError::Transport(format!("Failed to read response: {}", e)))?;

        tracing::debug!(path = %path, status = status.as_u16(), "platform response");

        if !status.is_success() {
            return Err(self.map_status_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| TrustError::Serialization(format!("Failed to parse {} response: {}", path, e)))
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, base: &str, path: &str, body: &B) -> Result<T> {
        let request = self.client.post(Self::url(base, path)).json(body);
        self.get_json(request, path).await
    }

    /// Map HTTP status codes to TrustError.
    fn map_status_error(&self, status: u16, body: &str) -> TrustError {
        // Pay APIv3 errors carry {code, message}
        if let Ok(pay) = serde_json::from_str::<PayErrorResponse>(body) {
            if !pay.code.is_empty() {
                return TrustError::Platform {
                    errcode: i64::from(status),
                    errmsg: format!("{}: {}", pay.code, pay.message),
                };
            }
        }
        match status {
            500..=599 => TrustError::Transport(format!("server error ({}): {}", status, body)),
            _ => TrustError::Platform {
                errcode: i64::from(status),
                errmsg: body.to_string(),
            },
        }
    }

    /// Map reqwest errors to TrustError.
    fn map_reqwest_error(&self, e: reqwest::Error) -> TrustError {
        // Drop the URL, it may carry the app secret
        let e = e.without_url();
        if e.is_timeout() {
            TrustError::Transport(format!("request timed out after {}s", self.config.timeout_secs))
        } else if e.is_connect() {
            TrustError::Transport(format!("connection failed: {}", e))
        } else {
            TrustError::transport(e)
        }
    }
}

#[async_trait]
impl PlatformApi for HttpPlatformClient {
    async fn fetch_access_token(&self, app_id: &str, secret: &str) -> Result<IssuedCredential> {
        tracing::debug!(app_id = %app_id, "requesting access token");
        let request = self
            .client
            .get(Self::url(&self.config.api_base_url, "/cgi-bin/token"))
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", app_id),
                ("secret", secret),
            ]);
        let body: AccessTokenResponse = self.get_json(request, "/cgi-bin/token").await?;
        body.into_issued()
    }

    async fn fetch_jsapi_ticket(&self, access_token: &str) -> Result<IssuedCredential> {
        let request = self
            .client
            .get(Self::url(&self.config.api_base_url, "/cgi-bin/ticket/getticket"))
            .query(&[("access_token", access_token), ("type", "jsapi")]);
        let body: TicketResponse = self.get_json(request, "/cgi-bin/ticket/getticket").await?;
        body.into_issued()
    }

    async fn fetch_certificates(&self, signer: &RequestSigner) -> Result<CertificateListResponse> {
        let signed = signer.sign_request("GET", CERTIFICATES_PATH, None)?;
        let request = self
            .client
            .get(Self::url(&self.config.pay_base_url, CERTIFICATES_PATH))
            .header(reqwest::header::AUTHORIZATION, signed.authorization)
            .header(reqwest::header::ACCEPT, "application/json");
        self.get_json(request, CERTIFICATES_PATH).await
    }

    async fn fetch_component_access_token(
        &self,
        component_app_id: &str,
        component_secret: &str,
        verify_ticket: &str,
    ) -> Result<IssuedCredential> {
        tracing::debug!(component_app_id = %component_app_id, "requesting component access token");
        let request = ComponentTokenRequest {
            component_appid: component_app_id,
            component_appsecret: component_secret,
            component_verify_ticket: verify_ticket,
        };
        let body: ComponentTokenResponse = self
            .post_json(&self.config.api_base_url, COMPONENT_TOKEN_PATH, &request)
            .await?;
        body.into_issued()
    }

    async fn start_push_ticket(&self, component_app_id: &str, component_secret: &str) -> Result<()> {
        let request = StartPushTicketRequest {
            component_appid: component_app_id,
            component_secret,
        };
        let status: PlatformStatus = self
            .post_json(&self.config.api_base_url, START_PUSH_TICKET_PATH, &request)
            .await?;
        status.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        assert_eq!(
            HttpPlatformClient::url("https://api.weixin.qq.com/", "/cgi-bin/token"),
            "https://api.weixin.qq.com/cgi-bin/token"
        );
        assert_eq!(
            HttpPlatformClient::url("http://127.0.0.1:8080", "v3/certificates"),
            "http://127.0.0.1:8080/v3/certificates"
        );
    }

    #[test]
    fn test_map_status_error() {
        let client = HttpPlatformClient::production().unwrap();

        let err = client.map_status_error(401, r#"{"code":"SIGN_ERROR","message":"bad signature"}"#);
        assert!(matches!(err, TrustError::Platform { errcode: 401, ref errmsg } if errmsg.starts_with("SIGN_ERROR")));

        assert!(client.map_status_error(502, "bad gateway").is_retryable());
        assert!(!client.map_status_error(404, "nope").is_retryable());
    }
}
