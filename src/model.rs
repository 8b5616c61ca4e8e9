use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};

use crate::errors::{CompileError, ModelError};

/// SHA-256 digest over the canonical contents of a [`Model`].
///
/// Two models with the same resources, capabilities and aliases share a
/// fingerprint regardless of declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelFingerprint([u8; 32]);

impl fmt::Display for ModelFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Base64UrlUnpadded::encode_string(&self.0))
    }
}

/// A validated resource kind with its capabilities and fully expanded aliases.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    name: String,
    capabilities: BTreeSet<String>,
    aliases: BTreeMap<String, Vec<String>>,
    /// alias -> leaf capabilities, computed once at build time
    expansions: HashMap<String, BTreeSet<String>>,
}

impl ResourceDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Aliases as authored: alias name -> referenced names.
    pub fn aliases(&self) -> &BTreeMap<String, Vec<String>> {
        &self.aliases
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains(name)
    }

    /// Add the capabilities `name` stands for to `out`.
    ///
    /// Aliases win over capabilities of the same name; an alias that shares
    /// its name with a capability always includes that capability when it
    /// lists itself. Returns `false` if `name` is neither.
    pub fn expand_into(&self, name: &str, out: &mut BTreeSet<String>) -> bool {
        if let Some(expanded) = self.expansions.get(name) {
            out.extend(expanded.iter().cloned());
            true
        } else if self.has_capability(name) {
            out.insert(name.to_string());
            true
        } else {
            false
        }
    }
}

/// The immutable resource/capability registry every policy compiles against.
#[derive(Debug)]
pub struct Model {
    resources: HashMap<String, ResourceDefinition>,
    fingerprint: ModelFingerprint,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn fingerprint(&self) -> ModelFingerprint {
        self.fingerprint
    }

    /// Expand requested capability/alias names of `resource` into the union
    /// of the capabilities they stand for.
    pub fn expand<I, S>(&self, resource: &str, names: I) -> Result<BTreeSet<String>, CompileError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let def = self
            .resource(resource)
            .ok_or_else(|| CompileError::UnknownResource {
                resource: resource.to_string(),
            })?;

        let mut out = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if !def.expand_into(name, &mut out) {
                return Err(CompileError::UnknownCapability {
                    resource: resource.to_string(),
                    name: name.to_string(),
                });
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
struct ResourceDraft {
    name: String,
    capabilities: BTreeSet<String>,
    aliases: BTreeMap<String, Vec<String>>,
}

/// Collects resource definitions; `build` validates and freezes them.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    resources: BTreeMap<String, ResourceDraft>,
}

/// Handle for filling in one resource registered with
/// [`ModelBuilder::define_resource`].
#[derive(Debug)]
pub struct ResourceBuilder<'a> {
    draft: &'a mut ResourceDraft,
}

impl ModelBuilder {
    pub fn define_resource(
        &mut self,
        name: impl Into<String>,
    ) -> Result<ResourceBuilder<'_>, ModelError> {
        match self.resources.entry(name.into()) {
            Entry::Occupied(e) => Err(ModelError::DuplicateResource(e.key().clone())),
            Entry::Vacant(e) => {
                let name = e.key().clone();
                let draft = e.insert(ResourceDraft {
                    name,
                    capabilities: BTreeSet::new(),
                    aliases: BTreeMap::new(),
                });
                Ok(ResourceBuilder { draft })
            }
        }
    }

    /// Check every alias graph without consuming the builder.
    pub fn validate(&self) -> Result<(), ModelError> {
        for draft in self.resources.values() {
            expand_aliases(draft)?;
        }
        Ok(())
    }

    pub fn build(self) -> Result<Model, ModelError> {
        let fingerprint = fingerprint(&self.resources);

        let mut resources = HashMap::with_capacity(self.resources.len());
        for (name, draft) in self.resources {
            let expansions = expand_aliases(&draft)?;
            resources.insert(
                name,
                ResourceDefinition {
                    name: draft.name,
                    capabilities: draft.capabilities,
                    aliases: draft.aliases,
                    expansions,
                },
            );
        }

        tracing::debug!(
            resources = resources.len(),
            fingerprint = %fingerprint,
            "Built authorization model"
        );

        Ok(Model {
            resources,
            fingerprint,
        })
    }
}

impl ResourceBuilder<'_> {
    /// Declare capabilities. The batch is checked as a whole, so a duplicate
    /// leaves the resource unchanged.
    pub fn capabilities<I, S>(self, names: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch = BTreeSet::new();
        for name in names {
            let name = name.into();
            if self.draft.capabilities.contains(&name) || batch.contains(&name) {
                return Err(ModelError::DuplicateCapability {
                    resource: self.draft.name.clone(),
                    capability: name,
                });
            }
            batch.insert(name);
        }
        self.draft.capabilities.extend(batch);
        Ok(self)
    }

    /// Register an alias. Targets are resolved when the model is validated,
    /// so they may name aliases declared later.
    pub fn alias<I, S>(self, name: impl Into<String>, targets: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.draft.aliases.entry(name.into()) {
            Entry::Occupied(e) => {
                return Err(ModelError::DuplicateAlias {
                    resource: self.draft.name.clone(),
                    alias: e.key().clone(),
                })
            }
            Entry::Vacant(e) => {
                let mut list: Vec<String> = Vec::new();
                for target in targets {
                    let target = target.into();
                    if !list.contains(&target) {
                        list.push(target);
                    }
                }
                e.insert(list);
            }
        }
        Ok(self)
    }
}

/// Expand every alias of one resource, failing on cycles and dangling targets.
fn expand_aliases(draft: &ResourceDraft) -> Result<HashMap<String, BTreeSet<String>>, ModelError> {
    let mut memo = HashMap::new();
    for alias in draft.aliases.keys() {
        let mut path = Vec::new();
        expand_alias(draft, alias, &mut memo, &mut path)?;
    }
    Ok(memo)
}

fn expand_alias(
    draft: &ResourceDraft,
    alias: &str,
    memo: &mut HashMap<String, BTreeSet<String>>,
    path: &mut Vec<String>,
) -> Result<BTreeSet<String>, ModelError> {
    if let Some(done) = memo.get(alias) {
        return Ok(done.clone());
    }

    if let Some(start) = path.iter().position(|p| p == alias) {
        let mut cycle = path[start..].to_vec();
        cycle.push(alias.to_string());
        return Err(ModelError::AliasCycle {
            resource: draft.name.clone(),
            cycle,
        });
    }

    let Some(targets) = draft.aliases.get(alias) else {
        return Ok(BTreeSet::new());
    };

    path.push(alias.to_string());
    let mut out = BTreeSet::new();
    for target in targets {
        if target != alias && draft.aliases.contains_key(target) {
            out.extend(expand_alias(draft, target, memo, path)?);
        } else if draft.capabilities.contains(target) {
            out.insert(target.clone());
        } else if target == alias {
            // self-reference without a same-named capability
            return Err(ModelError::AliasCycle {
                resource: draft.name.clone(),
                cycle: vec![alias.to_string(), alias.to_string()],
            });
        } else {
            return Err(ModelError::UndefinedAliasTarget {
                resource: draft.name.clone(),
                alias: alias.to_string(),
                target: target.clone(),
            });
        }
    }
    path.pop();

    memo.insert(alias.to_string(), out.clone());
    Ok(out)
}

fn fingerprint(resources: &BTreeMap<String, ResourceDraft>) -> ModelFingerprint {
    let mut hasher = Sha256::new();
    for (name, draft) in resources {
        hash_field(&mut hasher, b'r', name);
        for cap in &draft.capabilities {
            hash_field(&mut hasher, b'c', cap);
        }
        for (alias, targets) in &draft.aliases {
            hash_field(&mut hasher, b'a', alias);
            for target in targets {
                hash_field(&mut hasher, b't', target);
            }
        }
    }
    ModelFingerprint(hasher.finalize().into())
}

/// Tag and length-prefix each field so adjacent names cannot run together.
pub(crate) fn hash_field(hasher: &mut Sha256, tag: u8, value: &str) {
    hasher.update([tag]);
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
