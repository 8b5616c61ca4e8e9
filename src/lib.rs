//! Parallax - embeddable capability-based authorization
//!
//! A host resolves an opaque secret to the policies bound to it; parallax
//! compiles those policies against a resource/capability model and merges
//! them into an immutable [`Acl`] that answers point-in-time checks.

pub mod acl;
pub mod cache;
pub mod compiler;
pub mod document;
pub mod errors;
pub mod loader;
pub mod model;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod types;

pub use acl::Acl;
pub use cache::{Cache, MemoryCache, NoCache};
pub use compiler::{compile, CompiledPolicy};
pub use errors::{CompileError, ConfigError, ModelError, NotAuthorized, ResolveError};
pub use model::{Model, ModelBuilder, ModelFingerprint};
pub use resolver::{PolicyResolver, Resolver, ResolverConfig, SecretResolver};
pub use types::{InstanceFilter, Policy, Rule, Token};
