use std::sync::Arc;

use parallax::{Model, Policy, Rule};

/// `book` with `read`/`write` aliases that widen the capability of the same
/// name, plus a plain `shelf`.
pub fn library_model() -> Arc<Model> {
    let mut builder = Model::builder();
    builder
        .define_resource("book")
        .expect("define book")
        .capabilities(["read", "write", "list", "delete"])
        .expect("book capabilities")
        .alias("read", ["read", "list"])
        .expect("read alias")
        .alias("write", ["write", "read"])
        .expect("write alias");
    builder
        .define_resource("shelf")
        .expect("define shelf")
        .capabilities(["browse", "rearrange"])
        .expect("shelf capabilities");
    Arc::new(builder.build().expect("valid library model"))
}

/// Same resource names as [`library_model`], but `read` is not an alias.
pub fn archive_model() -> Arc<Model> {
    let mut builder = Model::builder();
    builder
        .define_resource("book")
        .expect("define book")
        .capabilities(["read", "write", "list", "delete"])
        .expect("book capabilities");
    Arc::new(builder.build().expect("valid archive model"))
}

pub fn librarian() -> Policy {
    Policy::new("librarian")
        .with_revision("1")
        .with_rule(Rule::new("book", "*", ["write"]))
}

pub fn reader() -> Policy {
    Policy::new("reader")
        .with_revision("1")
        .with_rule(Rule::new("book", "*", ["read"]))
        .with_rule(Rule::new("shelf", "fiction", ["browse"]))
}
