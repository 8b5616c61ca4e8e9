use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, MemoryCache, NoCache};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Compiled policies, keyed by model fingerprint, name and revision.
    pub policies: CacheTier,
    /// Merged ACLs, keyed by model fingerprint and secret digest.
    pub acls: CacheTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTier {
    pub enabled: bool,
    pub max_entries: u64,
    /// Entry lifetime in seconds; unset keeps entries until evicted.
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            // Compiled policies are keyed by revision, so stale entries are
            // never returned and a TTL only bounds memory.
            policies: CacheTier {
                enabled: true,
                max_entries: 10_000,
                ttl_secs: None,
            },
            // A cached ACL outlives token revocation until it expires.
            acls: CacheTier {
                enabled: false,
                max_entries: 10_000,
                ttl_secs: Some(30),
            },
        }
    }
}

impl CacheTier {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }

    /// Build the cache this tier describes.
    pub fn build<K, V>(&self) -> Arc<dyn Cache<K, V>>
    where
        K: std::hash::Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if self.enabled && self.max_entries > 0 {
            Arc::new(MemoryCache::<K, V>::new(self.max_entries, self.ttl()))
        } else {
            Arc::new(NoCache)
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let defaults = CacheSettings::default();
        let mut builder = config::Config::builder()
            .set_default("cache.policies.enabled", defaults.policies.enabled)
            .into_diagnostic()?
            .set_default("cache.policies.max_entries", defaults.policies.max_entries)
            .into_diagnostic()?
            .set_default("cache.acls.enabled", defaults.acls.enabled)
            .into_diagnostic()?
            .set_default("cache.acls.max_entries", defaults.acls.max_entries)
            .into_diagnostic()?
            .set_default("cache.acls.ttl_secs", defaults.acls.ttl_secs.unwrap_or(30))
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: PARALLAX__CACHE__ACLS__ENABLED=true, etc.
        builder = builder.add_source(
            config::Environment::with_prefix("PARALLAX")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().into_diagnostic()?;
        let settings: Settings = cfg.try_deserialize().into_diagnostic()?;

        tracing::debug!(?settings, "Loaded settings");
        Ok(settings)
    }
}
