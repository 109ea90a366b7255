//! Freshness checks and single-flight refresh on top of a [`CredentialCache`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{Credential, CredentialCache, CredentialKey};
use crate::{Result, TrustError};

/// Credentials are treated as expired this long before their real expiry.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(120);

/// A freshly obtained credential value and the lifetime the platform granted.
#[derive(Clone)]
pub struct IssuedCredential {
    /// Opaque value.
    pub value: String,
    /// Lifetime as reported by the issuer.
    pub expires_in: Duration,
}

impl IssuedCredential {
    /// Create a new issued credential.
    pub fn new(value: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            expires_in,
        }
    }
}

impl std::fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Reuses cached credentials while fresh and refreshes them otherwise.
///
/// Concurrent callers asking for the same stale key share one refresh: the
/// first takes a per-key lock and fetches, the rest wait on the lock and then
/// find the new value in the cache.
pub struct CredentialManager {
    cache: Arc<dyn CredentialCache>,
    safety_margin: Duration,
    flights: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CredentialManager {
    /// Create a manager over `cache` with the default [`SAFETY_MARGIN`].
    pub fn new(cache: Arc<dyn CredentialCache>) -> Self {
        Self {
            cache,
            safety_margin: SAFETY_MARGIN,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Override the safety margin.
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// The underlying cache.
    pub fn cache(&self) -> &Arc<dyn CredentialCache> {
        &self.cache
    }

    /// The safety margin subtracted from issued lifetimes.
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// The cached credential for `key`, if present and fresh.
    ///
    /// Backend read failures are logged and treated as a miss.
    pub async fn cached(&self, key: &CredentialKey) -> Option<Credential> {
        match self.cache.get(&key.cache_key()).await {
            Ok(Some(credential)) if credential.is_fresh() => Some(credential),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "credential cache read failed");
                None
            }
        }
    }

    /// Return a fresh credential for `key`, calling `refresh` if none is cached.
    ///
    /// A failed refresh yields `CredentialUnavailable`; stale values are never
    /// returned.
    #[tracing::instrument(skip(self, key, refresh), fields(key = %key))]
    pub async fn get_or_refresh<F, Fut>(&self, key: &CredentialKey, refresh: F) -> Result<Credential>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<IssuedCredential>> + Send,
    {
        if let Some(credential) = self.cached(key).await {
            return Ok(credential);
        }

        let flight = self.flight(key)?;
        let _guard = flight.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(credential) = self.cached(key).await {
            tracing::debug!("credential refreshed by concurrent caller");
            return Ok(credential);
        }

        self.refresh_locked(key, refresh).await
    }

    /// Fetch a new credential for `key` regardless of what is cached.
    #[tracing::instrument(skip(self, key, refresh), fields(key = %key))]
    pub async fn force_refresh<F, Fut>(&self, key: &CredentialKey, refresh: F) -> Result<Credential>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<IssuedCredential>> + Send,
    {
        let flight = self.flight(key)?;
        let _guard = flight.lock().await;
        self.refresh_locked(key, refresh).await
    }

    /// Store an externally obtained credential, e.g. a pushed verify ticket.
    pub async fn store(&self, key: &CredentialKey, issued: IssuedCredential) -> Result<Credential> {
        if issued.value.is_empty() {
            return Err(TrustError::credential_unavailable(key, "issuer returned an empty value"));
        }
        let credential = Credential::issue(issued.value, issued.expires_in, self.safety_margin);
        self.cache
            .set(&key.cache_key(), credential.clone(), Some(issued.expires_in))
            .await?;
        Ok(credential)
    }

    /// Drop the cached credential for `key`, returning whether one existed.
    pub async fn invalidate(&self, key: &CredentialKey) -> Result<bool> {
        tracing::debug!(key = %key, "invalidating credential");
        Ok(self.cache.remove(&key.cache_key()).await?)
    }

    async fn refresh_locked<F, Fut>(&self, key: &CredentialKey, refresh: F) -> Result<Credential>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<IssuedCredential>> + Send,
    {
        tracing::debug!("refreshing credential");
        let issued = refresh().await.map_err(|e| {
            tracing::warn!(error = %e, code = ?e.code(), "credential refresh failed");
            match e {
                TrustError::CredentialUnavailable { .. } => e,
                other => TrustError::credential_unavailable(key, other.to_string()),
            }
        })?;
        let expires_in = issued.expires_in;
        let credential = self.store(key, issued).await?;
        tracing::info!(expires_in_secs = expires_in.as_secs(), "credential refreshed");
        Ok(credential)
    }

    fn flight(&self, key: &CredentialKey) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut flights = self
            .flights
            .lock()
            .map_err(|_| TrustError::Internal("credential flight lock poisoned".into()))?;
        Ok(flights.entry(key.cache_key()).or_default().clone())
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("safety_margin", &self.safety_margin)
            .finish_non_exhaustive()
    }
}
