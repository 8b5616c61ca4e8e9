use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use parallax::errors::BoxError;
use parallax::{Cache, MemoryCache, Policy, PolicyResolver, SecretResolver, Token};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Secret lookups over a fixed map, counting every call.
#[derive(Default)]
pub struct CountingSecrets {
    tokens: Mutex<HashMap<String, Token>>,
    calls: AtomicUsize,
}

impl CountingSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token<I, S>(self, secret: &str, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens
            .lock()
            .unwrap()
            .insert(secret.to_string(), Token::new(policies));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretResolver for CountingSecrets {
    async fn resolve_secret(&self, _cancel: &CancellationToken, secret: &str) -> Result<Token, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .get(secret)
            .cloned()
            .ok_or_else(|| "unknown secret".into())
    }
}

/// Policy lookups over a mutable map, counting every call.
#[derive(Default)]
pub struct CountingPolicies {
    policies: Mutex<HashMap<String, Policy>>,
    calls: AtomicUsize,
}

impl CountingPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, policy: Policy) -> Self {
        self.put(policy);
        self
    }

    /// Add or replace a policy, as a host store would on an update.
    pub fn put(&self, policy: Policy) {
        self.policies
            .lock()
            .unwrap()
            .insert(policy.name.clone(), policy);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyResolver for CountingPolicies {
    async fn resolve_policy(&self, _cancel: &CancellationToken, name: &str) -> Result<Policy, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.policies
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| format!("no policy named {name}").into())
    }
}

/// A policy store that never answers. `started` fires on the first call.
#[derive(Default)]
pub struct StallingPolicies {
    pub started: Notify,
}

#[async_trait]
impl PolicyResolver for StallingPolicies {
    async fn resolve_policy(&self, _cancel: &CancellationToken, _name: &str) -> Result<Policy, BoxError> {
        self.started.notify_one();
        std::future::pending::<Result<Policy, BoxError>>().await
    }
}

/// In-memory cache that counts inserts and hits.
pub struct RecordingCache<K, V> {
    inner: MemoryCache<K, V>,
    inserts: AtomicUsize,
    hits: AtomicUsize,
}

impl<K, V> RecordingCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::new(1_000, None),
            inserts: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for RecordingCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let hit = self.inner.get(key).await;
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        hit
    }

    async fn insert(&self, key: K, value: V) {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(key, value).await;
    }

    async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    async fn invalidate_all(&self) {
        self.inner.invalidate_all().await;
    }
}
