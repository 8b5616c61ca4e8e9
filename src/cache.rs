//! Swappable caches used by the [`Resolver`](crate::resolver::Resolver).
//!
//! Two implementations ship with the crate:
//!
//! - [`NoCache`] - every lookup misses, nothing is stored
//! - [`MemoryCache`] - bounded in-process cache with an optional TTL
//!
//! Hosts that keep compiled policies or ACLs elsewhere implement [`Cache`]
//! themselves.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::acl::Acl;
use crate::compiler::CompiledPolicy;
use crate::model::ModelFingerprint;

/// Key/value store with whole-value inserts.
///
/// Values are inserted only once they are complete, so readers never observe
/// a partially built entry.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Returns `None` on a miss or an expired entry.
    async fn get(&self, key: &K) -> Option<V>;

    async fn insert(&self, key: K, value: V);

    async fn invalidate(&self, key: &K);

    async fn invalidate_all(&self);
}

/// Compiled policies, keyed by model, policy name and revision.
pub type PolicyCache = dyn Cache<PolicyKey, Arc<CompiledPolicy>>;

/// Merged ACLs, keyed by model and secret digest.
pub type AclCache = dyn Cache<AclKey, Arc<Acl>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyKey {
    pub model: ModelFingerprint,
    pub name: String,
    pub revision: String,
}

impl PolicyKey {
    pub fn new(model: ModelFingerprint, name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
            revision: revision.into(),
        }
    }
}

/// Cache key for a merged ACL. Holds a SHA-256 digest of the secret, never
/// the secret itself.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AclKey {
    model: ModelFingerprint,
    secret_digest: [u8; 32],
}

impl AclKey {
    pub fn new(model: ModelFingerprint, secret: &str) -> Self {
        Self {
            model,
            secret_digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    pub fn model(&self) -> ModelFingerprint {
        self.model
    }
}

impl std::fmt::Debug for AclKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclKey")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// A cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl<K, V> Cache<K, V> for NoCache
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, _key: &K) -> Option<V> {
        None
    }

    async fn insert(&self, _key: K, _value: V) {}

    async fn invalidate(&self, _key: &K) {}

    async fn invalidate_all(&self) {}
}

/// Bounded in-memory cache backed by `moka`.
pub struct MemoryCache<K, V> {
    inner: moka::future::Cache<K, V>,
    max_entries: u64,
    ttl: Option<Duration>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// `ttl` of `None` keeps entries until evicted by capacity or invalidated.
    pub fn new(max_entries: u64, ttl: Option<Duration>) -> Self {
        let mut builder = moka::future::Cache::builder().max_capacity(max_entries);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
            max_entries,
            ttl,
        }
    }
}

impl<K, V> std::fmt::Debug for MemoryCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_entries", &self.max_entries)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    async fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
