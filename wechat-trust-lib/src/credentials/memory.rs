//! In-memory credential cache.
//!
//! Suitable for a single process. Deployments with several workers should
//! share credentials through an external store behind [`CredentialCache`].
//!
//! # Thread Safety
//!
//! This cache uses `RwLock` for thread-safe access. Lock poisoning is
//! reported as a backend error rather than panicking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::traits::{CacheError, CacheResult, Credential, CredentialCache};

#[derive(Clone)]
struct Entry {
    credential: Credential,
    evict_at: Option<Instant>,
}

impl Entry {
    fn is_evicted(&self, now: Instant) -> bool {
        self.evict_at.is_some_and(|at| at <= now)
    }
}

/// Process-local [`CredentialCache`].
///
/// The `ttl_hint` passed to `set` is honoured as a hard eviction time.
pub struct InMemoryCredentialCache {
    entries: RwLock<HashMap<String, Entry>>,
    closed: AtomicBool,
}

fn lock_error(context: &str) -> CacheError {
    CacheError::Backend(format!("InMemoryCredentialCache: lock poisoned during {}", context))
}

impl InMemoryCredentialCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of stored entries, evicted or not.
    ///
    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }
}

impl Default for InMemoryCredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialCache for InMemoryCredentialCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Credential>> {
        self.ensure_open()?;
        let now = Instant::now();
        {
            let entries = self.entries.read().map_err(|_| lock_error("get"))?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_evicted(now) => return Ok(Some(entry.credential.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().map_err(|_| lock_error("get"))?;
        if entries.get(key).is_some_and(|e| e.is_evicted(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, credential: Credential, ttl_hint: Option<Duration>) -> CacheResult<()> {
        self.ensure_open()?;
        let evict_at = ttl_hint.and_then(|ttl| Instant::now().checked_add(ttl));
        let mut entries = self.entries.write().map_err(|_| lock_error("set"))?;
        entries.insert(key.to_string(), Entry { credential, evict_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.write().map_err(|_| lock_error("remove"))?;
        Ok(entries.remove(key).is_some())
    }

    async fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::Release);
        let mut entries = self.entries.write().map_err(|_| lock_error("close"))?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(value: &str) -> Credential {
        Credential::issue(value, Duration::from_secs(3600), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCredentialCache::new();
        cache.set("k", credential("v1"), None).await.unwrap();

        let got = cache.get("k").await.unwrap().unwrap();
        assert_eq!(got.value, "v1");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCredentialCache::new();
        assert!(cache.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_whole_value() {
        let cache = InMemoryCredentialCache::new();
        cache.set("k", credential("old"), None).await.unwrap();
        cache.set("k", credential("new"), None).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().unwrap().value, "new");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_ttl_hint_evicts() {
        let cache = InMemoryCredentialCache::new();
        cache
            .set("k", credential("v"), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_stale_credential_is_still_returned() {
        // Freshness is the caller's concern
        let cache = InMemoryCredentialCache::new();
        let stale = Credential::issue("v", Duration::from_secs(1), Duration::from_secs(120));
        cache.set("k", stale, None).await.unwrap();

        let got = cache.get("k").await.unwrap().unwrap();
        assert!(!got.is_fresh());
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = InMemoryCredentialCache::new();
        cache.set("k", credential("v"), None).await.unwrap();

        assert!(cache.remove("k").await.unwrap());
        assert!(!cache.remove("k").await.unwrap());
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_rejects_further_use() {
        let cache = InMemoryCredentialCache::new();
        cache.set("k", credential("v"), None).await.unwrap();
        cache.close().await.unwrap();

        assert!(matches!(cache.get("k").await, Err(CacheError::Closed)));
        assert!(matches!(
            cache.set("k", credential("v"), None).await,
            Err(CacheError::Closed)
        ));
        assert!(cache.is_empty());
    }
}
