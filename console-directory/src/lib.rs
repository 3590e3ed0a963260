//! Maps `(subject-kind, group-name)` to an ordered list of user identities.
//! Pluggable per kind, cacheable. See `spec.md` §2, §6, §9.
//!
//! The concrete corporate directory adapter is explicitly out of scope
//! (`spec.md` §1 Non-goals: "Implementing the directory protocol itself").
//! This crate defines the capability boundary and a caching wrapper, plus
//! a fake implementation for tests.

mod cache;
mod fake;
mod registry;

pub use cache::CachingResolver;
pub use fake::StaticResolver;
pub use registry::Registry;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("no resolver registered for subject kind '{0}'")]
    UnregisteredKind(String),
    #[error("directory lookup for group '{group}' failed: {message}")]
    Lookup { group: String, message: String },
    #[error("directory call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// `MembersOf(ctx, groupName) -> (users[], error)` from `spec.md` §6.
#[async_trait]
pub trait DirectoryResolver: Send + Sync {
    async fn members_of(&self, group_name: &str) -> Result<Vec<String>, DirectoryError>;
}

#[async_trait]
impl<T: DirectoryResolver + ?Sized> DirectoryResolver for std::sync::Arc<T> {
    async fn members_of(&self, group_name: &str) -> Result<Vec<String>, DirectoryError> {
        (**self).members_of(group_name).await
    }
}
