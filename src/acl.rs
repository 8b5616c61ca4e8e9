use std::collections::{BTreeSet, HashMap, HashSet};

use crate::compiler::CompiledPolicy;
use crate::errors::NotAuthorized;
use crate::types::InstanceFilter;

/// Merged grants for one resource.
///
/// Wildcard grants are folded into a single set; exact grants are keyed by
/// instance id. A check unions the wildcard set with the instance's set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ResourceIndex {
    wildcard: HashSet<String>,
    exact: HashMap<String, HashSet<String>>,
}

impl ResourceIndex {
    fn allows(&self, instance: &str, capability: &str) -> bool {
        self.wildcard.contains(capability)
            || self
                .exact
                .get(instance)
                .is_some_and(|caps| caps.contains(capability))
    }
}

/// Immutable authorization decision object for one secret.
///
/// Built by [`Acl::merge`]; there is no way to mutate it afterwards, so it
/// can be shared freely across threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    resources: HashMap<String, ResourceIndex>,
}

impl Acl {
    /// An ACL that denies everything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Union the grants of every compiled policy.
    ///
    /// Rules only ever enable capabilities, so the result does not depend on
    /// the order of `policies`.
    pub fn merge<'a, I>(policies: I) -> Self
    where
        I: IntoIterator<Item = &'a CompiledPolicy>,
    {
        let mut resources: HashMap<String, ResourceIndex> = HashMap::new();

        for policy in policies {
            for (resource, grants) in policy.grants() {
                let index = resources.entry(resource.clone()).or_default();
                for grant in grants {
                    let target = match &grant.instance {
                        InstanceFilter::Any => &mut index.wildcard,
                        InstanceFilter::Exact(id) => index.exact.entry(id.clone()).or_default(),
                    };
                    target.extend(grant.capabilities.iter().cloned());
                }
            }
        }

        Self { resources }
    }

    /// Decide whether `capability` is granted on `instance` of `resource`.
    ///
    /// The capability is matched literally; aliases were expanded when the
    /// policies were compiled.
    pub fn check(&self, resource: &str, instance: &str, capability: &str) -> Result<(), NotAuthorized> {
        let allowed = self
            .resources
            .get(resource)
            .is_some_and(|index| index.allows(instance, capability));

        if allowed {
            Ok(())
        } else {
            Err(NotAuthorized {
                resource: resource.to_string(),
                instance: instance.to_string(),
                capability: capability.to_string(),
            })
        }
    }

    pub fn is_authorized(&self, resource: &str, instance: &str, capability: &str) -> bool {
        self.check(resource, instance, capability).is_ok()
    }

    /// Every capability granted on `instance` of `resource`.
    pub fn capabilities(&self, resource: &str, instance: &str) -> BTreeSet<String> {
        let Some(index) = self.resources.get(resource) else {
            return BTreeSet::new();
        };
        let mut caps: BTreeSet<String> = index.wildcard.iter().cloned().collect();
        if let Some(exact) = index.exact.get(instance) {
            caps.extend(exact.iter().cloned());
        }
        caps
    }

    /// Resources this ACL has any grant for.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
