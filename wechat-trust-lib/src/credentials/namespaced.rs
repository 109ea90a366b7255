//! Key prefixing for shared cache backends.

use std::time::Duration;

use async_trait::async_trait;

use super::traits::{CacheError, CacheResult, Credential, CredentialCache};

/// Default prefix applied to every key.
pub const DEFAULT_NAMESPACE: &str = "wechat-trust:";

/// Wraps a cache so that several applications can share one backend.
///
/// Every key is prefixed with the namespace; empty keys are rejected.
pub struct NamespacedCache<C> {
    inner: C,
    namespace: String,
}

impl<C: CredentialCache> NamespacedCache<C> {
    /// Wrap `inner` with the [`DEFAULT_NAMESPACE`].
    pub fn new(inner: C) -> Self {
        Self::with_namespace(inner, DEFAULT_NAMESPACE)
    }

    /// Wrap `inner` with a custom namespace.
    pub fn with_namespace(inner: C, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
        }
    }

    /// The namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn full_key(&self, key: &str) -> CacheResult<String> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        Ok(format!("{}{}", self.namespace, key))
    }
}

#[async_trait]
impl<C: CredentialCache> CredentialCache for NamespacedCache<C> {
    async fn get(&self, key: &str) -> CacheResult<Option<Credential>> {
        let key = self.full_key(key)?;
        self.inner.get(&key).await
    }

    async fn set(&self, key: &str, credential: Credential, ttl_hint: Option<Duration>) -> CacheResult<()> {
        let key = self.full_key(key)?;
        self.inner.set(&key, credential, ttl_hint).await
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        let key = self.full_key(key)?;
        self.inner.remove(&key).await
    }

    async fn close(&self) -> CacheResult<()> {
        self.inner.close().await
    }
}
