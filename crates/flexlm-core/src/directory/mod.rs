//! User → location resolution.
//!
//! The aggregator only ever sees the [`LocationResolver`] capability. Two
//! implementations are selected at startup:
//!
//! - [`NoopResolver`] when directory integration is disabled or unavailable
//! - [`DirectoryResolver`] wrapping any [`Directory`] backend
//!
//! How a backend talks to the directory (protocol, server discovery, bind
//! credentials, search fallbacks) stays behind the [`Directory`] trait.

mod command;
mod domain;
mod entry;

use std::time::Duration;

use async_trait::async_trait;

use crate::model::LocationInfo;

pub use command::{CommandDirectory, find_executable};
pub use domain::{detect_domain_environment, detect_domain_from_env};
pub use entry::{DirectoryEntry, parse_directory_output};

/// Error type for directory lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The directory subsystem cannot be used at all.
    Unavailable(String),
    /// The user does not exist in the directory.
    NotFound(String),
    /// The lookup did not finish in time.
    Timeout(Duration),
    /// The backend reported an error.
    Backend(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Unavailable(msg) => write!(f, "directory unavailable: {}", msg),
            DirectoryError::NotFound(user) => write!(f, "user {} not found in directory", user),
            DirectoryError::Timeout(t) => {
                write!(f, "directory lookup timed out after {}ms", t.as_millis())
            }
            DirectoryError::Backend(msg) => write!(f, "directory error: {}", msg),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Backend that can look a user up in a directory service.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn lookup(&self, username: &str) -> Result<DirectoryEntry, DirectoryError>;
}

/// Maps a username to where that user sits.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self, username: &str) -> Result<LocationInfo, DirectoryError>;

    /// Whether this resolver does real lookups.
    fn is_enabled(&self) -> bool;
}

/// Resolver used when directory integration is off. Everyone is `Unknown`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait]
impl LocationResolver for NoopResolver {
    async fn resolve(&self, _username: &str) -> Result<LocationInfo, DirectoryError> {
        Ok(LocationInfo::unknown())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Resolver backed by a [`Directory`].
pub struct DirectoryResolver<D> {
    directory: D,
}

impl<D: Directory> DirectoryResolver<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<D: Directory> LocationResolver for DirectoryResolver<D> {
    async fn resolve(&self, username: &str) -> Result<LocationInfo, DirectoryError> {
        let entry = self.directory.lookup(username).await?;
        Ok(entry.location_info())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticDirectory(HashMap<String, DirectoryEntry>);

    #[async_trait]
    impl Directory for StaticDirectory {
        async fn lookup(&self, username: &str) -> Result<DirectoryEntry, DirectoryError> {
            self.0
                .get(username)
                .cloned()
                .ok_or_else(|| DirectoryError::NotFound(username.to_string()))
        }
    }

    #[tokio::test]
    async fn test_noop_resolver_is_unknown() {
        let resolver = NoopResolver;
        assert!(!resolver.is_enabled());
        assert!(resolver.resolve("anyone").await.unwrap().is_unknown());
    }

    #[tokio::test]
    async fn test_directory_resolver_derives_location() {
        let mut users = HashMap::new();
        users.insert(
            "jdoe".to_string(),
            DirectoryEntry {
                office: "Building 2".to_string(),
                city: "Berlin".to_string(),
                department: "Engineering".to_string(),
                ..DirectoryEntry::default()
            },
        );
        let resolver = DirectoryResolver::new(StaticDirectory(users));

        assert!(resolver.is_enabled());
        let info = resolver.resolve("jdoe").await.unwrap();
        assert_eq!(info.location, "Building 2 - Berlin");
        assert_eq!(info.department, "Engineering");

        let err = resolver.resolve("ghost").await.unwrap_err();
        assert_eq!(err, DirectoryError::NotFound("ghost".to_string()));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            DirectoryError::Timeout(Duration::from_millis(1500)).to_string(),
            "directory lookup timed out after 1500ms"
        );
        assert_eq!(
            DirectoryError::NotFound("x".into()).to_string(),
            "user x not found in directory"
        );
    }
}
