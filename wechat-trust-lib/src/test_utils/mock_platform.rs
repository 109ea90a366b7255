//! In-process [`PlatformApi`] for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::certificates::{CertificateEntry, CertificateListResponse};
use crate::client::PlatformApi;
use crate::credentials::IssuedCredential;
use crate::signing::RequestSigner;
use crate::{Result, TrustError};

/// Mock platform that issues numbered tokens and serves a configurable
/// certificate listing. Counts every call.
#[derive(Default)]
pub struct MockPlatformApi {
    certificates: RwLock<Vec<CertificateEntry>>,
    token_calls: AtomicUsize,
    ticket_calls: AtomicUsize,
    certificate_calls: AtomicUsize,
    component_token_calls: AtomicUsize,
    push_ticket_calls: AtomicUsize,
}

impl MockPlatformApi {
    /// Serve these PEM certificates, sealed with [`super::API_V3_KEY`].
    pub fn with_certificates(pems: &[&str]) -> Self {
        let api = Self::default();
        api.set_certificates(pems);
        api
    }

    /// Replace the served certificates.
    pub fn set_certificates(&self, pems: &[&str]) {
        let entries = pems.iter().map(|pem| super::seal_certificate(pem)).collect();
        if let Ok(mut certificates) = self.certificates.write() {
            *certificates = entries;
        }
    }

    /// Number of access token requests.
    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    /// Number of ticket requests.
    pub fn ticket_calls(&self) -> usize {
        self.ticket_calls.load(Ordering::SeqCst)
    }

    /// Number of certificate downloads.
    pub fn certificate_calls(&self) -> usize {
        self.certificate_calls.load(Ordering::SeqCst)
    }

    /// Number of component access token requests.
    pub fn component_token_calls(&self) -> usize {
        self.component_token_calls.load(Ordering::SeqCst)
    }

    /// Number of requests to start ticket pushes.
    pub fn push_ticket_calls(&self) -> usize {
        self.push_ticket_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformApi for MockPlatformApi {
    async fn fetch_access_token(&self, app_id: &str, secret: &str) -> Result<IssuedCredential> {
        if secret.is_empty() {
            return Err(TrustError::Platform {
                errcode: 40125,
                errmsg: "invalid appsecret".into(),
            });
        }
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssuedCredential::new(
            format!("token-{}-{}", app_id, n),
            Duration::from_secs(7200),
        ))
    }

    async fn fetch_jsapi_ticket(&self, access_token: &str) -> Result<IssuedCredential> {
        let n = self.ticket_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssuedCredential::new(
            format!("ticket-{}-{}", access_token, n),
            Duration::from_secs(7200),
        ))
    }

    async fn fetch_certificates(&self, _signer: &RequestSigner) -> Result<CertificateListResponse> {
        self.certificate_calls.fetch_add(1, Ordering::SeqCst);
        let data = self
            .certificates
            .read()
            .map_err(|_| TrustError::Internal("mock lock poisoned".into()))?
            .clone();
        Ok(CertificateListResponse { data })
    }

    async fn fetch_component_access_token(
        &self,
        component_app_id: &str,
        component_secret: &str,
        verify_ticket: &str,
    ) -> Result<IssuedCredential> {
        if component_secret.is_empty() {
            return Err(TrustError::Platform {
                errcode: 40125,
                errmsg: "invalid appsecret".into(),
            });
        }
        let n = self.component_token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssuedCredential::new(
            format!("component-{}-{}-{}", component_app_id, verify_ticket, n),
            Duration::from_secs(7200),
        ))
    }

    async fn start_push_ticket(&self, _component_app_id: &str, _component_secret: &str) -> Result<()> {
        self.push_ticket_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
