//! Core types and the cache trait for short-lived credentials.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest TTL accepted from the platform (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

/// Error type for cache backends.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("empty cache key")]
    EmptyKey,
    #[error("cache is closed")]
    Closed,
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

impl From<CacheError> for crate::TrustError {
    fn from(err: CacheError) -> Self {
        crate::TrustError::Cache(err.to_string())
    }
}

/// A short-lived secret (access token, ticket, certificate set) with its expiry.
///
/// Credentials are replaced whole on refresh, never partially updated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque value.
    pub value: String,
    /// When the credential was obtained.
    pub issued_at: DateTime<Utc>,
    /// When the credential must no longer be used.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential with explicit timestamps.
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_at,
        }
    }

    /// Create a credential issued now that expires `ttl - safety_margin` from now.
    ///
    /// A TTL shorter than the margin yields a credential that is already stale.
    pub fn issue(value: impl Into<String>, ttl: Duration, safety_margin: Duration) -> Self {
        let issued_at = Utc::now();
        let usable = ttl.saturating_sub(safety_margin).as_secs().min(MAX_TTL_SECS);
        Self {
            value: value.into(),
            issued_at,
            expires_at: issued_at + chrono::Duration::seconds(usable as i64),
        }
    }

    /// Whether the credential is still usable at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Whether the credential is still usable.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What a credential is for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Official account API access token.
    AccessToken,
    /// JS-SDK signing ticket.
    JsapiTicket,
    /// Third-party platform verify ticket pushed by the platform.
    ComponentVerifyTicket,
    /// Third-party platform access token.
    ComponentAccessToken,
    /// Platform certificate set of a merchant.
    PlatformCertificates,
    /// Anything else.
    Custom(String),
}

impl CredentialKind {
    /// Stable name used in cache keys.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AccessToken => "access_token",
            Self::JsapiTicket => "jsapi_ticket",
            Self::ComponentVerifyTicket => "component_verify_ticket",
            Self::ComponentAccessToken => "component_access_token",
            Self::PlatformCertificates => "platform_certificates",
            Self::Custom(name) => name,
        }
    }
}

/// Identity of a cached credential: the owning account plus the kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    /// App id or merchant id.
    pub owner: String,
    /// Credential kind.
    pub kind: CredentialKind,
}

impl CredentialKey {
    /// Create a new key.
    pub fn new(owner: impl Into<String>, kind: CredentialKind) -> Self {
        Self {
            owner: owner.into(),
            kind,
        }
    }

    /// Key string used with [`CredentialCache`].
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.kind.as_str())
    }
}

/// Key/value store for credentials.
///
/// Stores are deliberately dumb: they do not evict by `expires_at`, callers
/// check freshness before reuse. `ttl_hint` lets backends with native expiry
/// (Redis and friends) drop entries as a safety net.
///
/// Implementations must never log credential values.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Read a credential.
    async fn get(&self, key: &str) -> CacheResult<Option<Credential>>;

    /// Store or replace a credential.
    async fn set(&self, key: &str, credential: Credential, ttl_hint: Option<Duration>) -> CacheResult<()>;

    /// Remove a credential, returning whether it existed.
    async fn remove(&self, key: &str) -> CacheResult<bool>;

    /// Release backend resources.
    async fn close(&self) -> CacheResult<()>;
}

#[async_trait]
impl<T: CredentialCache + ?Sized> CredentialCache for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> CacheResult<Option<Credential>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, credential: Credential, ttl_hint: Option<Duration>) -> CacheResult<()> {
        (**self).set(key, credential, ttl_hint).await
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        (**self).remove(key).await
    }

    async fn close(&self) -> CacheResult<()> {
        (**self).close().await
    }
}
