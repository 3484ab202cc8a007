//! Repository operations the upload side needs from the storage platform.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Kind of hub repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Model,
    Dataset,
    Space,
}

impl RepoKind {
    /// Singular form used in create payloads ("dataset").
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Model => "model",
            RepoKind::Dataset => "dataset",
            RepoKind::Space => "space",
        }
    }

    /// Plural form used in API paths ("datasets").
    pub fn api_segment(&self) -> &'static str {
        match self {
            RepoKind::Model => "models",
            RepoKind::Dataset => "datasets",
            RepoKind::Space => "spaces",
        }
    }

    /// Prefix of the repository's git URL path; models have none.
    pub fn url_prefix(&self) -> &'static str {
        match self {
            RepoKind::Model => "",
            RepoKind::Dataset => "datasets/",
            RepoKind::Space => "spaces/",
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts both singular and plural spellings.
impl FromStr for RepoKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" | "models" => Ok(RepoKind::Model),
            "dataset" | "datasets" => Ok(RepoKind::Dataset),
            "space" | "spaces" => Ok(RepoKind::Space),
            other => Err(StoreError::InvalidRepo(format!("unknown repository type '{}'", other))),
        }
    }
}

/// A repository on the hub: kind plus `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoId {
    #[serde(rename = "type")]
    pub kind: RepoKind,
    pub name: String,
}

impl RepoId {
    pub fn new(kind: RepoKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.name.split_once('/').map(|(owner, _)| owner)
    }

    pub fn short_name(&self) -> &str {
        self.name
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.url_prefix(), self.name)
    }
}

/// Parameters for creating a repository.
#[derive(Debug, Clone)]
pub struct RepoSpec {
    pub repo: RepoId,
    pub license: Option<String>,
    pub private: bool,
}

/// Outcome of [`DatasetStore::create_repo_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoCreation {
    Created,
    AlreadyExists,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub oid: Option<String>,
}

/// Errors from the storage platform's API.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The platform answered with a non-success status.
    #[error("hub API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("hub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The platform answered with something this client does not understand.
    #[error("unexpected hub response: {0}")]
    Protocol(String),

    #[error("invalid repository: {0}")]
    InvalidRepo(String),
}

impl StoreError {
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Api { status, .. } => Some(*status),
            StoreError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Repository and file operations on the storage platform.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Account name behind the configured credentials.
    async fn whoami(&self) -> Result<String, StoreError>;

    /// Create a repository. An existing one is a 409 [`StoreError::Api`].
    async fn create_repo(&self, spec: &RepoSpec) -> Result<(), StoreError>;

    /// Commit `content` at `path` in `repo`.
    async fn upload_blob(&self, repo: &RepoId, path: &str, content: Bytes) -> Result<(), StoreError>;

    /// Commit the removal of `path` from `repo`.
    async fn delete_file(&self, repo: &RepoId, path: &str) -> Result<(), StoreError>;

    /// Every file in `repo`, recursively.
    async fn list_files(&self, repo: &RepoId) -> Result<Vec<RepoFile>, StoreError>;

    /// Create the repository unless it already exists.
    async fn create_repo_if_absent(&self, spec: &RepoSpec) -> Result<RepoCreation, StoreError> {
        match self.create_repo(spec).await {
            Ok(()) => Ok(RepoCreation::Created),
            Err(e) if e.is_conflict() => Ok(RepoCreation::AlreadyExists),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedStore {
        create_status: Option<u16>,
        creates: Mutex<u32>,
    }

    #[async_trait]
    impl DatasetStore for ScriptedStore {
        async fn whoami(&self) -> Result<String, StoreError> {
            Ok("tester".into())
        }

        async fn create_repo(&self, _spec: &RepoSpec) -> Result<(), StoreError> {
            *self.creates.lock().unwrap() += 1;
            match self.create_status {
                None => Ok(()),
                Some(status) => Err(StoreError::Api {
                    status,
                    message: "scripted".into(),
                }),
            }
        }

        async fn upload_blob(&self, _: &RepoId, _: &str, _: Bytes) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_file(&self, _: &RepoId, _: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn list_files(&self, _: &RepoId) -> Result<Vec<RepoFile>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn spec() -> RepoSpec {
        RepoSpec {
            repo: RepoId::new(RepoKind::Dataset, "acme/clips"),
            license: Some("mit".into()),
            private: false,
        }
    }

    #[tokio::test]
    async fn test_create_if_absent_outcomes() {
        let fresh = ScriptedStore { create_status: None, creates: Mutex::new(0) };
        assert_eq!(fresh.create_repo_if_absent(&spec()).await.unwrap(), RepoCreation::Created);

        let existing = ScriptedStore { create_status: Some(409), creates: Mutex::new(0) };
        assert_eq!(
            existing.create_repo_if_absent(&spec()).await.unwrap(),
            RepoCreation::AlreadyExists
        );

        let forbidden = ScriptedStore { create_status: Some(403), creates: Mutex::new(0) };
        let err = forbidden.create_repo_if_absent(&spec()).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(*forbidden.creates.lock().unwrap(), 1);
    }

    #[test]
    fn test_repo_kind_spellings() {
        assert_eq!("datasets".parse::<RepoKind>().unwrap(), RepoKind::Dataset);
        assert_eq!("model".parse::<RepoKind>().unwrap(), RepoKind::Model);
        assert!("bucket".parse::<RepoKind>().is_err());
    }

    #[test]
    fn test_repo_id_parts() {
        let repo = RepoId::new(RepoKind::Dataset, "acme/clips");
        assert_eq!(repo.owner(), Some("acme"));
        assert_eq!(repo.short_name(), "clips");
        assert_eq!(repo.to_string(), "datasets/acme/clips");
        assert_eq!(RepoId::new(RepoKind::Model, "acme/bert").to_string(), "acme/bert");
    }
}
