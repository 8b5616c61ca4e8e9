use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::document::{parse_document, ParsedDocument};
use crate::errors::DocumentError;
use crate::model::Model;
use crate::types::{Policy, Token};

/// Everything declared by a directory of KDL documents.
#[derive(Debug, Clone)]
pub struct LoadedDocuments {
    pub model: Arc<Model>,
    pub policies: HashMap<String, Policy>,
    /// Tokens keyed by secret.
    pub tokens: HashMap<String, Token>,
}

/// Load all `.kdl` documents from the given directory and merge them into a
/// validated model plus the declared policies and tokens.
pub fn load_dir(dir: &Path) -> Result<LoadedDocuments, DocumentError> {
    if !dir.is_dir() {
        return Err(DocumentError::Invalid(format!(
            "documents directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    let mut all_parsed = Vec::with_capacity(entries.len());
    for entry in &entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| DocumentError::Load {
                path: path.display().to_string(),
                source,
            })?;
        all_parsed.push(parse_document(&contents)?);
    }

    let loaded = assemble(all_parsed)?;

    tracing::info!(
        files = entries.len(),
        resources = loaded.model.len(),
        policies = loaded.policies.len(),
        tokens = loaded.tokens.len(),
        model = %loaded.model.fingerprint(),
        "Loaded authorization documents"
    );

    Ok(loaded)
}

/// Merge parsed documents. Resource, policy and secret names must be unique
/// across all of them.
pub fn assemble(parsed: Vec<ParsedDocument>) -> Result<LoadedDocuments, DocumentError> {
    let mut builder = Model::builder();
    let mut policies: HashMap<String, Policy> = HashMap::new();
    let mut tokens: HashMap<String, Token> = HashMap::new();

    for doc in parsed {
        for resource in &doc.resources {
            resource.define(&mut builder)?;
        }
        for policy in doc.policies {
            if policies.contains_key(&policy.name) {
                return Err(DocumentError::Invalid(format!(
                    "policy `{}` is defined more than once",
                    policy.name
                )));
            }
            policies.insert(policy.name.clone(), policy);
        }
        for (secret, token) in doc.tokens {
            if tokens.insert(secret, token).is_some() {
                return Err(DocumentError::Invalid(
                    "a token secret is declared more than once".into(),
                ));
            }
        }
    }

    let model = builder.build()?;

    Ok(LoadedDocuments {
        model: Arc::new(model),
        policies,
        tokens,
    })
}
