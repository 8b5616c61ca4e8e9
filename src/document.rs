use kdl::{KdlDocument, KdlNode, KdlValue};

use crate::errors::{DocumentError, ModelError};
use crate::model::ModelBuilder;
use crate::types::{InstanceFilter, Policy, Rule, Token};

/// A resource as written in a document, before model validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDecl {
    pub name: String,
    pub capabilities: Vec<String>,
    pub aliases: Vec<(String, Vec<String>)>,
}

impl ResourceDecl {
    /// Register this resource with `builder`.
    pub fn define(&self, builder: &mut ModelBuilder) -> Result<(), ModelError> {
        let mut resource = builder
            .define_resource(self.name.clone())?
            .capabilities(self.capabilities.iter().cloned())?;
        for (alias, targets) in &self.aliases {
            resource = resource.alias(alias.clone(), targets.iter().cloned())?;
        }
        Ok(())
    }
}

/// Intermediate result from parsing a single KDL document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub resources: Vec<ResourceDecl>,
    pub policies: Vec<Policy>,
    /// (secret, token) pairs for the static store
    pub tokens: Vec<(String, Token)>,
}

/// Parse a KDL document string into resources, policies and tokens.
pub fn parse_document(source: &str) -> Result<ParsedDocument, DocumentError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| DocumentError::KdlParse(e.to_string()))?;

    let mut parsed = ParsedDocument::default();

    for node in doc.nodes() {
        match node.name().value() {
            "resource" => parsed.resources.push(parse_resource(node)?),
            "policy" => parsed.policies.push(parse_policy(node)?),
            "token" => {
                let secret = first_string_arg(node).ok_or_else(|| {
                    DocumentError::Invalid(
                        "token node requires a secret argument (e.g. token \"s3cret\" { - \"librarian\" })"
                            .into(),
                    )
                })?;
                parsed.tokens.push((secret, Token::new(dash_list(node)?)));
            }
            other => {
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(parsed)
}

fn parse_resource(node: &KdlNode) -> Result<ResourceDecl, DocumentError> {
    let name = first_string_arg(node).ok_or_else(|| {
        DocumentError::Invalid(
            "resource node requires a string argument (e.g. resource \"book\")".into(),
        )
    })?;

    let mut decl = ResourceDecl {
        name,
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "capabilities" => {
                    decl.capabilities.extend(dash_list(child)?);
                }
                "alias" => {
                    let alias = first_string_arg(child).ok_or_else(|| {
                        DocumentError::Invalid(format!(
                            "alias in resource `{}` requires a name argument (e.g. alias \"write\" {{ - \"read\" }})",
                            decl.name
                        ))
                    })?;
                    decl.aliases.push((alias, dash_list(child)?));
                }
                other => {
                    return Err(DocumentError::Invalid(format!(
                        "unexpected child `{other}` in resource `{}` (expected `capabilities` or `alias`)",
                        decl.name
                    )));
                }
            }
        }
    }

    Ok(decl)
}

fn parse_policy(node: &KdlNode) -> Result<Policy, DocumentError> {
    let name = first_string_arg(node).ok_or_else(|| {
        DocumentError::Invalid(
            "policy node requires a string argument (e.g. policy \"librarian\")".into(),
        )
    })?;

    let mut policy = Policy::new(name);
    policy.revision = match node.get("revision") {
        None => None,
        Some(value) => Some(scalar_string(value).ok_or_else(|| {
            DocumentError::Invalid(format!(
                "policy `{}` has a revision that is neither a string nor an integer",
                policy.name
            ))
        })?),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "rule" => {
                    let resource = first_string_arg(child).ok_or_else(|| {
                        DocumentError::Invalid(format!(
                            "rule in policy `{}` requires a resource argument (e.g. rule \"book\" instance=\"*\")",
                            policy.name
                        ))
                    })?;
                    // Only an absent `instance` means every instance.
                    let instance = match child.get("instance") {
                        None => InstanceFilter::Any,
                        Some(value) => scalar_string(value)
                            .map(|id| InstanceFilter::parse(&id))
                            .ok_or_else(|| {
                                DocumentError::Invalid(format!(
                                    "rule in policy `{}` has a non-string instance",
                                    policy.name
                                ))
                            })?,
                    };
                    policy.rules.push(Rule {
                        resource,
                        instance,
                        capabilities: dash_list(child)?,
                    });
                }
                other => {
                    return Err(DocumentError::Invalid(format!(
                        "unexpected child `{other}` in policy `{}` (expected `rule`)",
                        policy.name
                    )));
                }
            }
        }
    }

    Ok(policy)
}

/// Strings as-is, integers in decimal.
fn scalar_string(value: &KdlValue) -> Option<String> {
    value
        .as_string()
        .map(|s| s.to_string())
        .or_else(|| value.as_integer().map(|i| i.to_string()))
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Extract dash-list children: nodes named "-" whose first argument is a string.
/// An entry without a string argument is an error.
/// Example KDL:
/// ```kdl
/// capabilities {
///     - "read"
///     - "write"
/// }
/// ```
fn dash_list(node: &KdlNode) -> Result<Vec<String>, DocumentError> {
    let Some(children) = node.children() else {
        return Ok(Vec::new());
    };
    children
        .nodes()
        .iter()
        .filter(|n| n.name().value() == "-")
        .map(|item| {
            first_string_arg(item).ok_or_else(|| {
                DocumentError::Invalid(format!(
                    "list entry under `{}` must be a string (e.g. - \"read\")",
                    node.name().value()
                ))
            })
        })
        .collect()
}
