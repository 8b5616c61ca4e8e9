use miette::Diagnostic;
use thiserror::Error;

/// Boxed error returned by host collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ModelError {
    #[error("Resource `{0}` is defined more than once")]
    #[diagnostic(
        code(parallax::model::duplicate_resource),
        help("Each resource name may only be passed to `define_resource` once")
    )]
    DuplicateResource(String),

    #[error("Capability `{capability}` is declared more than once on resource `{resource}`")]
    #[diagnostic(code(parallax::model::duplicate_capability))]
    DuplicateCapability { resource: String, capability: String },

    #[error("Alias `{alias}` is declared more than once on resource `{resource}`")]
    #[diagnostic(code(parallax::model::duplicate_alias))]
    DuplicateAlias { resource: String, alias: String },

    #[error("Cyclic alias definition on resource `{resource}`: {}", .cycle.join(" -> "))]
    #[diagnostic(
        code(parallax::model::alias_cycle),
        help("Aliases may reference other aliases of the same resource, but never themselves, directly or indirectly")
    )]
    AliasCycle { resource: String, cycle: Vec<String> },

    #[error("Alias `{alias}` on resource `{resource}` references undefined name `{target}`")]
    #[diagnostic(
        code(parallax::model::undefined_alias_target),
        help("Alias targets must name a capability or another alias of the same resource")
    )]
    UndefinedAliasTarget {
        resource: String,
        alias: String,
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum CompileError {
    #[error("Unknown resource `{resource}`")]
    #[diagnostic(
        code(parallax::compile::unknown_resource),
        help("Rules may only reference resources defined in the model")
    )]
    UnknownResource { resource: String },

    #[error("Unknown capability `{name}` on resource `{resource}`")]
    #[diagnostic(
        code(parallax::compile::unknown_capability),
        help("Requested names must be capabilities or aliases declared on the resource")
    )]
    UnknownCapability { resource: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Resolver configuration is missing required field `{0}`")]
    #[diagnostic(code(parallax::config::missing_field))]
    MissingField(&'static str),
}

/// Failure while turning a secret into an ACL.
///
/// A denied check is not a resolution failure and is reported through
/// [`NotAuthorized`] instead.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("Failed to resolve secret")]
    #[diagnostic(code(parallax::resolve::secret))]
    SecretResolution {
        #[source]
        source: BoxError,
    },

    #[error("Failed to resolve policy `{name}`")]
    #[diagnostic(code(parallax::resolve::policy))]
    PolicyResolution {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to compile policy `{policy}`")]
    #[diagnostic(code(parallax::resolve::compile))]
    Compile {
        policy: String,
        #[source]
        #[diagnostic_source]
        source: CompileError,
    },

    #[error("Resolution was cancelled")]
    #[diagnostic(code(parallax::resolve::cancelled))]
    Cancelled,
}

/// The negative result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("Not authorized: `{capability}` on {resource}/{instance}")]
#[diagnostic(code(parallax::denied))]
pub struct NotAuthorized {
    pub resource: String,
    pub instance: String,
    pub capability: String,
}

#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error("Failed to load document `{path}`")]
    #[diagnostic(
        code(parallax::document::load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid document: {0}")]
    #[diagnostic(
        code(parallax::document::invalid),
        help("Documents may contain `resource`, `policy` and `token` nodes")
    )]
    Invalid(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(parallax::document::kdl_parse),
        help("Check your KDL file syntax; see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(parallax::document::io))]
    Io(#[from] std::io::Error),
}

/// Lookup failures of the in-memory [`StaticStore`](crate::store::StaticStore).
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum StoreError {
    // The secret itself is never part of the message.
    #[error("Unknown secret")]
    #[diagnostic(
        code(parallax::store::unknown_secret),
        help("Secrets are bound to tokens with a `token` node")
    )]
    UnknownSecret,

    #[error("Unknown policy `{0}`")]
    #[diagnostic(code(parallax::store::unknown_policy))]
    UnknownPolicy(String),
}
