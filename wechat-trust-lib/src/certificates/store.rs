//! Cached platform certificate set of one merchant.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use zeroize::Zeroizing;

use super::{decrypt_certificate_list, CertificateSet, PlatformCertificate};
use crate::client::PlatformApi;
use crate::config::MerchantConfig;
use crate::credentials::{CredentialKey, CredentialKind, CredentialManager, IssuedCredential};
use crate::signing::RequestSigner;
use crate::{Result, TrustError};

/// How long a downloaded certificate set is reused.
pub const CERTIFICATE_TTL: Duration = Duration::from_secs(12 * 3600);

/// Download, decrypt and index the platform certificates of a merchant.
#[tracing::instrument(skip(api, signer, api_v3_key), fields(mch_id = %signer.mch_id()))]
pub async fn fetch_all(api: &dyn PlatformApi, signer: &RequestSigner, api_v3_key: &[u8]) -> Result<CertificateSet> {
    let listing = api.fetch_certificates(signer).await?;
    let set = decrypt_certificate_list(&listing.data, api_v3_key)?;
    tracing::debug!(count = set.len(), "platform certificates downloaded");
    Ok(set)
}

/// Platform certificates of one merchant, cached through a [`CredentialManager`].
///
/// The cache holds the decrypted PEM documents under the
/// `<mch_id>:platform_certificates` key, so several processes sharing a cache
/// backend download the listing once per TTL.
pub struct CertificateStore {
    signer: RequestSigner,
    api_v3_key: Zeroizing<Vec<u8>>,
    api: Arc<dyn PlatformApi>,
    credentials: Arc<CredentialManager>,
    ttl: Duration,
    parsed: RwLock<Option<(String, Arc<CertificateSet>)>>,
}

impl CertificateStore {
    /// Create a store for a merchant.
    pub fn new(
        signer: RequestSigner,
        api_v3_key: &[u8],
        api: Arc<dyn PlatformApi>,
        credentials: Arc<CredentialManager>,
    ) -> Result<Self> {
        if api_v3_key.len() != crate::aead::KEY_SIZE {
            return Err(TrustError::InvalidKey(format!(
                "APIv3 key must be {} bytes, got {}",
                crate::aead::KEY_SIZE,
                api_v3_key.len()
            )));
        }
        Ok(Self {
            signer,
            api_v3_key: Zeroizing::new(api_v3_key.to_vec()),
            api,
            credentials,
            ttl: CERTIFICATE_TTL,
            parsed: RwLock::new(None),
        })
    }

    /// Create a store from merchant configuration.
    pub fn from_config(
        config: &MerchantConfig,
        api: Arc<dyn PlatformApi>,
        credentials: Arc<CredentialManager>,
    ) -> Result<Self> {
        Self::new(
            RequestSigner::from_config(config)?,
            config.api_v3_key_bytes()?,
            api,
            credentials,
        )
    }

    /// Override how long a downloaded set is reused.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The merchant's APIv3 key.
    pub fn api_v3_key(&self) -> &[u8] {
        &self.api_v3_key
    }

    /// Merchant id.
    pub fn mch_id(&self) -> &str {
        self.signer.mch_id()
    }

    fn key(&self) -> CredentialKey {
        CredentialKey::new(self.signer.mch_id(), CredentialKind::PlatformCertificates)
    }

    /// The current certificate set, downloading it when the cache is stale.
    pub async fn certificates(&self) -> Result<Arc<CertificateSet>> {
        let credential = self
            .credentials
            .get_or_refresh(&self.key(), move || self.download())
            .await?;
        self.parse_cached(&credential.value)
    }

    /// Download the set regardless of what is cached.
    pub async fn refresh(&self) -> Result<Arc<CertificateSet>> {
        tracing::info!(mch_id = %self.mch_id(), "refreshing platform certificates");
        let credential = self
            .credentials
            .force_refresh(&self.key(), move || self.download())
            .await?;
        self.parse_cached(&credential.value)
    }

    /// Look up a certificate by serial number.
    pub async fn get(&self, serial: &str) -> Result<PlatformCertificate> {
        self.certificates()
            .await?
            .get(serial)
            .cloned()
            .ok_or_else(|| TrustError::unknown_certificate(serial))
    }

    /// The certificate to encrypt outbound sensitive fields with.
    pub async fn newest(&self) -> Result<PlatformCertificate> {
        self.certificates()
            .await?
            .newest()
            .cloned()
            .ok_or_else(|| TrustError::credential_unavailable(self.key(), "no platform certificates published"))
    }

    async fn download(&self) -> Result<IssuedCredential> {
        let set = fetch_all(self.api.as_ref(), &self.signer, &self.api_v3_key).await?;
        if set.is_empty() {
            return Err(TrustError::credential_unavailable(self.key(), "empty certificate listing"));
        }
        let pems: Vec<&str> = set.iter().map(|c| c.pem.as_str()).collect();
        Ok(IssuedCredential::new(serde_json::to_string(&pems)?, self.ttl))
    }

    fn parse_cached(&self, value: &str) -> Result<Arc<CertificateSet>> {
        {
            let parsed = self
                .parsed
                .read()
                .map_err(|_| TrustError::Internal("certificate memo lock poisoned".into()))?;
            if let Some((cached, set)) = parsed.as_ref() {
                if cached == value {
                    return Ok(set.clone());
                }
            }
        }

        let pems: Vec<String> = serde_json::from_str(value)?;
        let set = Arc::new(CertificateSet::from_pems(pems.iter().map(String::as_str))?);
        let mut parsed = self
            .parsed
            .write()
            .map_err(|_| TrustError::Internal("certificate memo lock poisoned".into()))?;
        *parsed = Some((value.to_string(), set.clone()));
        Ok(set)
    }
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("mch_id", &self.signer.mch_id())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
