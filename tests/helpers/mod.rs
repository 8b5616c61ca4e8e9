#![allow(dead_code)]

pub mod doubles;
pub mod fixtures;

pub use doubles::{CountingPolicies, CountingSecrets, RecordingCache, StallingPolicies};
pub use fixtures::{archive_model, librarian, library_model, reader};
