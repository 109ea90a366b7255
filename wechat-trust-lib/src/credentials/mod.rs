//! Caching of short-lived platform credentials.
//!
//! [`CredentialCache`] is the pluggable storage seam; [`CredentialManager`]
//! adds freshness checks with a safety margin and per-key single-flight
//! refresh on top of any backend.

mod manager;
mod memory;
mod namespaced;
mod traits;

pub use manager::{CredentialManager, IssuedCredential, SAFETY_MARGIN};
pub use memory::InMemoryCredentialCache;
pub use namespaced::{NamespacedCache, DEFAULT_NAMESPACE};
pub use traits::{CacheError, CacheResult, Credential, CredentialCache, CredentialKey, CredentialKind};
