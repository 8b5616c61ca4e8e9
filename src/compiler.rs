use std::collections::{BTreeSet, HashMap};

use crate::errors::CompileError;
use crate::model::Model;
use crate::types::{InstanceFilter, Policy};

/// One compiled rule: an instance filter and the capabilities it enables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub instance: InstanceFilter,
    pub capabilities: BTreeSet<String>,
}

/// A policy with every alias expanded, indexed by resource.
///
/// Several grants for the same resource may overlap (a wildcard grant plus
/// narrower exact-instance grants); they are combined at merge time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledPolicy {
    name: String,
    grants: HashMap<String, Vec<Grant>>,
}

impl CompiledPolicy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grants(&self) -> &HashMap<String, Vec<Grant>> {
        &self.grants
    }

    pub fn grants_for(&self, resource: &str) -> &[Grant] {
        self.grants
            .get(resource)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn grant_count(&self) -> usize {
        self.grants.values().map(|v| v.len()).sum()
    }
}

/// Compile `policy` against `model`.
///
/// Fails on the first rule that names an unknown resource or a name that is
/// neither a capability nor an alias of its resource.
pub fn compile(policy: &Policy, model: &Model) -> Result<CompiledPolicy, CompileError> {
    let mut grants: HashMap<String, Vec<Grant>> = HashMap::new();

    for rule in &policy.rules {
        let capabilities = model.expand(&rule.resource, &rule.capabilities)?;
        grants.entry(rule.resource.clone()).or_default().push(Grant {
            instance: rule.instance.clone(),
            capabilities,
        });
    }

    let compiled = CompiledPolicy {
        name: policy.name.clone(),
        grants,
    };

    tracing::debug!(
        policy = %policy.name,
        rules = policy.rules.len(),
        resources = compiled.grants.len(),
        "Compiled policy"
    );

    Ok(compiled)
}
