use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::acl::Acl;
use crate::cache::{AclCache, AclKey, MemoryCache, NoCache, PolicyCache, PolicyKey};
use crate::compiler::{compile, CompiledPolicy};
use crate::errors::{BoxError, ConfigError, ResolveError};
use crate::model::Model;
use crate::settings::CacheSettings;
use crate::types::{Policy, Token};

/// Host-side lookup of the token a secret is bound to.
///
/// Unknown secrets and storage failures are both reported as errors.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve_secret(&self, cancel: &CancellationToken, secret: &str) -> Result<Token, BoxError>;
}

/// Host-side lookup of a policy by name.
#[async_trait]
pub trait PolicyResolver: Send + Sync {
    async fn resolve_policy(&self, cancel: &CancellationToken, name: &str) -> Result<Policy, BoxError>;
}

/// Inputs for [`Resolver::new`].
///
/// `model`, `secret_resolver` and `policy_resolver` are required. Without an
/// explicit cache the resolver keeps compiled policies in memory and does
/// not cache merged ACLs.
#[derive(Clone, Default)]
pub struct ResolverConfig {
    pub model: Option<Arc<Model>>,
    pub secret_resolver: Option<Arc<dyn SecretResolver>>,
    pub policy_resolver: Option<Arc<dyn PolicyResolver>>,
    pub policy_cache: Option<Arc<PolicyCache>>,
    pub acl_cache: Option<Arc<AclCache>>,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: Arc<Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_secret_resolver(mut self, resolver: Arc<dyn SecretResolver>) -> Self {
        self.secret_resolver = Some(resolver);
        self
    }

    pub fn with_policy_resolver(mut self, resolver: Arc<dyn PolicyResolver>) -> Self {
        self.policy_resolver = Some(resolver);
        self
    }

    pub fn with_policy_cache(mut self, cache: Arc<PolicyCache>) -> Self {
        self.policy_cache = Some(cache);
        self
    }

    pub fn with_acl_cache(mut self, cache: Arc<AclCache>) -> Self {
        self.acl_cache = Some(cache);
        self
    }

    /// Install the caches described by `settings`.
    pub fn with_settings(self, settings: &CacheSettings) -> Self {
        self.with_policy_cache(settings.policies.build())
            .with_acl_cache(settings.acls.build())
    }
}

impl std::fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("model", &self.model.as_ref().map(|m| m.fingerprint()))
            .field("secret_resolver", &self.secret_resolver.is_some())
            .field("policy_resolver", &self.policy_resolver.is_some())
            .field("policy_cache", &self.policy_cache.is_some())
            .field("acl_cache", &self.acl_cache.is_some())
            .finish()
    }
}

/// Turns secrets into merged ACLs against one fixed model.
pub struct Resolver {
    model: Arc<Model>,
    secrets: Arc<dyn SecretResolver>,
    policies: Arc<dyn PolicyResolver>,
    policy_cache: Arc<PolicyCache>,
    acl_cache: Arc<AclCache>,
}

/// Outcome of an uncached resolution, before anything is written to a cache.
struct Resolution {
    acl: Acl,
    compiled: Vec<(PolicyKey, Arc<CompiledPolicy>)>,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Result<Self, ConfigError> {
        let model = config.model.ok_or(ConfigError::MissingField("model"))?;
        let secrets = config
            .secret_resolver
            .ok_or(ConfigError::MissingField("secret_resolver"))?;
        let policies = config
            .policy_resolver
            .ok_or(ConfigError::MissingField("policy_resolver"))?;

        let policy_cache: Arc<PolicyCache> = match config.policy_cache {
            Some(cache) => cache,
            None => Arc::new(MemoryCache::<PolicyKey, Arc<CompiledPolicy>>::new(10_000, None)),
        };
        let acl_cache: Arc<AclCache> = match config.acl_cache {
            Some(cache) => cache,
            None => Arc::new(NoCache),
        };

        tracing::info!(
            model = %model.fingerprint(),
            resources = model.len(),
            "Created authorization resolver"
        );

        Ok(Self {
            model,
            secrets,
            policies,
            policy_cache,
            acl_cache,
        })
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Resolve `secret` to the merged ACL of every policy on its token.
    ///
    /// Cancelling `cancel` aborts the resolution with
    /// [`ResolveError::Cancelled`]; caches are only written once a
    /// resolution has fully succeeded.
    pub async fn resolve_secret(
        &self,
        cancel: &CancellationToken,
        secret: &str,
    ) -> Result<Arc<Acl>, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let acl_key = AclKey::new(self.model.fingerprint(), secret);
        if let Some(acl) = self.acl_cache.get(&acl_key).await {
            tracing::debug!("ACL cache hit");
            return Ok(acl);
        }

        let resolution = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Resolution cancelled");
                return Err(ResolveError::Cancelled);
            }
            resolution = self.resolve_uncached(cancel, secret) => resolution?,
        };

        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        for (key, compiled) in resolution.compiled {
            self.policy_cache.insert(key, compiled).await;
        }
        let acl = Arc::new(resolution.acl);
        self.acl_cache.insert(acl_key, Arc::clone(&acl)).await;

        Ok(acl)
    }

    async fn resolve_uncached(
        &self,
        cancel: &CancellationToken,
        secret: &str,
    ) -> Result<Resolution, ResolveError> {
        let token = self
            .secrets
            .resolve_secret(cancel, secret)
            .await
            .map_err(|source| ResolveError::SecretResolution { source })?;

        tracing::debug!(policies = token.policies.len(), "Resolved token");

        let mut merged: Vec<Arc<CompiledPolicy>> = Vec::with_capacity(token.policies.len());
        let mut compiled = Vec::new();
        let mut seen = HashSet::new();

        for name in &token.policies {
            if !seen.insert(name.as_str()) {
                continue;
            }

            let policy = self
                .policies
                .resolve_policy(cancel, name)
                .await
                .map_err(|source| ResolveError::PolicyResolution {
                    name: name.clone(),
                    source,
                })?;

            let key = PolicyKey::new(self.model.fingerprint(), name, policy.effective_revision());
            let entry = match self.policy_cache.get(&key).await {
                Some(hit) => {
                    tracing::debug!(policy = %name, revision = %key.revision, "Compiled policy cache hit");
                    hit
                }
                None => {
                    let fresh = compile(&policy, &self.model).map_err(|source| {
                        ResolveError::Compile {
                            policy: name.clone(),
                            source,
                        }
                    })?;
                    let fresh = Arc::new(fresh);
                    compiled.push((key, Arc::clone(&fresh)));
                    fresh
                }
            };
            merged.push(entry);
        }

        let acl = Acl::merge(merged.iter().map(|p| p.as_ref()));
        Ok(Resolution { acl, compiled })
    }

    /// Drop the cached ACL of one secret.
    pub async fn invalidate_secret(&self, secret: &str) {
        let key = AclKey::new(self.model.fingerprint(), secret);
        self.acl_cache.invalidate(&key).await;
    }

    /// Drop every cached ACL and compiled policy.
    pub async fn invalidate_all(&self) {
        self.acl_cache.invalidate_all().await;
        self.policy_cache.invalidate_all().await;
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("model", &self.model.fingerprint())
            .finish_non_exhaustive()
    }
}
