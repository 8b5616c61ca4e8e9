use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};

use crate::model::hash_field;

/// Which instances of a resource a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceFilter {
    /// Every instance (`*`).
    Any,
    /// Exactly one instance identifier.
    Exact(String),
}

impl InstanceFilter {
    pub const WILDCARD: &'static str = "*";

    pub fn parse(s: &str) -> Self {
        if s == Self::WILDCARD {
            Self::Any
        } else {
            Self::Exact(s.to_string())
        }
    }

    pub fn matches(&self, instance: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(id) => id == instance,
        }
    }
}

impl From<&str> for InstanceFilter {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for InstanceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(Self::WILDCARD),
            Self::Exact(id) => f.write_str(id),
        }
    }
}

/// A rule as authored: capability and alias names are not yet expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub resource: String,
    pub instance: InstanceFilter,
    pub capabilities: Vec<String>,
}

impl Rule {
    pub fn new<I, S>(resource: impl Into<String>, instance: impl Into<InstanceFilter>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource: resource.into(),
            instance: instance.into(),
            capabilities: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named bundle of rules, as handed over by the host's policy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    /// Version or etag from the store; compiled policies are cached per revision.
    pub revision: Option<String>,
    pub rules: Vec<Rule>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: None,
            rules: Vec::new(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The host-supplied revision, or a digest of the rules when there is none.
    pub fn effective_revision(&self) -> String {
        match &self.revision {
            Some(rev) => rev.clone(),
            None => format!("sha256:{}", self.content_digest()),
        }
    }

    fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for rule in &self.rules {
            hash_field(&mut hasher, b'r', &rule.resource);
            match &rule.instance {
                InstanceFilter::Any => hasher.update([b'*']),
                InstanceFilter::Exact(id) => hash_field(&mut hasher, b'i', id),
            }
            for name in &rule.capabilities {
                hash_field(&mut hasher, b'c', name);
            }
        }
        Base64UrlUnpadded::encode_string(&hasher.finalize())
    }
}

/// The record a secret resolves to: the names of its bound policies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    pub policies: Vec<String>,
}

impl Token {
    pub fn new<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            policies: policies.into_iter().map(Into::into).collect(),
        }
    }
}
