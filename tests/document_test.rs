use std::fs;
use std::sync::Arc;

use parallax::errors::DocumentError;
use parallax::loader::load_dir;
use parallax::store::StaticStore;
use parallax::{CompileError, ResolveError, Resolver, ResolverConfig};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const LIBRARY: &str = r#"
resource "book" {
    capabilities {
        - "read"
        - "write"
        - "list"
        - "delete"
    }
    alias "read" {
        - "read"
        - "list"
    }
    alias "write" {
        - "write"
        - "read"
    }
}

// unknown nodes are skipped
dashboard "ignored"
"#;

const ACCESS: &str = r#"
policy "librarian" revision="3" {
    rule "book" instance="*" {
        - "write"
    }
}

policy "curator" {
    rule "book" instance="necronomicon" {
        - "delete"
    }
}

policy "vandal" {
    rule "book" {
        - "burn"
    }
}

token "s3cret" {
    - "librarian"
}

token "keeper" {
    - "librarian"
    - "curator"
}

token "rogue" {
    - "vandal"
}
"#;

fn resolver_for(dir: &TempDir) -> Resolver {
    let loaded = load_dir(dir.path()).expect("documents load");
    let model = Arc::clone(&loaded.model);
    let store = Arc::new(StaticStore::from(loaded));
    Resolver::new(
        ResolverConfig::new()
            .with_model(model)
            .with_secret_resolver(store.clone())
            .with_policy_resolver(store),
    )
    .expect("valid resolver config")
}

fn library_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("library.kdl"), LIBRARY).expect("write library.kdl");
    fs::write(dir.path().join("access.kdl"), ACCESS).expect("write access.kdl");
    dir
}

#[tokio::test]
async fn test_documents_drive_decisions() {
    let dir = library_dir();
    let resolver = resolver_for(&dir);
    let cancel = CancellationToken::new();

    let acl = resolver.resolve_secret(&cancel, "s3cret").await.unwrap();
    assert!(acl.check("book", "lotr", "write").is_ok());
    assert!(acl.check("book", "lotr", "list").is_ok());
    assert!(acl.check("book", "lotr", "delete").is_err());

    let acl = resolver.resolve_secret(&cancel, "keeper").await.unwrap();
    assert!(acl.check("book", "necronomicon", "delete").is_ok());
    assert!(acl.check("book", "lotr", "delete").is_err());
    assert!(acl.check("book", "lotr", "read").is_ok());
}

#[tokio::test]
async fn test_unknown_secret_does_not_leak() {
    let dir = library_dir();
    let resolver = resolver_for(&dir);

    let err = resolver
        .resolve_secret(&CancellationToken::new(), "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::SecretResolution { .. }));
    assert!(!format!("{err:?}").contains("hunter2"));
}

#[tokio::test]
async fn test_invalid_policy_surfaces_at_resolution() {
    let dir = library_dir();
    let resolver = resolver_for(&dir);

    let err = resolver
        .resolve_secret(&CancellationToken::new(), "rogue")
        .await
        .unwrap_err();
    match err {
        ResolveError::Compile { policy, source } => {
            assert_eq!(policy, "vandal");
            assert!(matches!(source, CompileError::UnknownCapability { .. }));
        }
        other => panic!("expected Compile, got {other:?}"),
    }
}

#[test]
fn test_undefined_alias_target_fails_loading() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(
        dir.path().join("broken.kdl"),
        r#"
resource "book" {
    capabilities {
        - "read"
    }
    alias "edit" {
        - "write"
    }
}
"#,
    )
    .unwrap();

    let err = load_dir(dir.path()).unwrap_err();
    assert!(matches!(err, DocumentError::Model(_)));
    assert!(err.to_string().contains("write"));
}
