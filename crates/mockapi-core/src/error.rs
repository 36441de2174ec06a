use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no such file or directory: {}", .0.display())]
    NotFound(PathBuf),
    #[error("{source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failure reported by a non-filesystem provider.
    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path)
        } else {
            StorageError::Io { path, source }
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Could not set active profile. Profile \"{0}\" does not exist")]
    UnknownProfile(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No possible responses found in directory: \"{}\" for method: {method}", .directory.display())]
    NoResponseFound { directory: PathBuf, method: String },
    #[error("status {status} extracted from {} is not a valid HTTP status", .path.display())]
    InvalidStatus { path: PathBuf, status: u16 },
    #[error("{source}")]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResolveError {
    /// Whether the failure means "nothing to serve" rather than a broken fixture.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ResolveError::NoResponseFound { .. } | ResolveError::Storage(StorageError::NotFound(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
