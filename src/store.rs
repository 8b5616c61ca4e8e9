//! Fixed in-memory tokens and policies.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::{BoxError, StoreError};
use crate::loader::LoadedDocuments;
use crate::resolver::{PolicyResolver, SecretResolver};
use crate::types::{Policy, Token};

/// Secret and policy lookups over fixed maps.
///
/// Backs the CLI and any host whose policies are known at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticStore {
    tokens: HashMap<String, Token>,
    policies: HashMap<String, Policy>,
}

impl StaticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `secret` to `token`, replacing any earlier binding.
    pub fn with_token(mut self, secret: impl Into<String>, token: Token) -> Self {
        self.tokens.insert(secret.into(), token);
        self
    }

    /// Add or replace a policy under its own name.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.insert(policy.name.clone(), policy);
        self
    }

    pub fn policies(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values()
    }

    pub fn token(&self, secret: &str) -> Result<&Token, StoreError> {
        self.tokens.get(secret).ok_or(StoreError::UnknownSecret)
    }

    pub fn policy(&self, name: &str) -> Result<&Policy, StoreError> {
        self.policies
            .get(name)
            .ok_or_else(|| StoreError::UnknownPolicy(name.to_string()))
    }
}

impl From<LoadedDocuments> for StaticStore {
    fn from(loaded: LoadedDocuments) -> Self {
        Self {
            tokens: loaded.tokens,
            policies: loaded.policies,
        }
    }
}

#[async_trait]
impl SecretResolver for StaticStore {
    async fn resolve_secret(&self, _cancel: &CancellationToken, secret: &str) -> Result<Token, BoxError> {
        Ok(self.token(secret)?.clone())
    }
}

#[async_trait]
impl PolicyResolver for StaticStore {
    async fn resolve_policy(&self, _cancel: &CancellationToken, name: &str) -> Result<Policy, BoxError> {
        Ok(self.policy(name)?.clone())
    }
}
