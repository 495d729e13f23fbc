//! Artifact persistence
//!
//! The orchestrator writes one complete snapshot per request, after the run
//! reached COMPLETED. Stores never read back or merge.

use crate::artifacts::ArtifactSnapshot;
use crate::error::StoreError;
use crate::types::RequestId;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// File holding serialized project metadata inside a project directory
pub const METADATA_FILE: &str = "project_metadata.json";

/// Persistence collaborator
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write the final snapshot for a request
    async fn write(&self, request_id: RequestId, snapshot: &ArtifactSnapshot) -> Result<(), StoreError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    snapshots: DashMap<RequestId, ArtifactSnapshot>,
}

impl InMemoryArtifactStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored snapshot for a request
    #[must_use]
    pub fn get(&self, request_id: RequestId) -> Option<ArtifactSnapshot> {
        self.snapshots.get(&request_id).map(|s| s.value().clone())
    }

    /// Number of stored snapshots
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True when nothing was stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn write(&self, request_id: RequestId, snapshot: &ArtifactSnapshot) -> Result<(), StoreError> {
        match self.snapshots.entry(request_id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyWritten(request_id)),
            Entry::Vacant(slot) => {
                slot.insert(snapshot.clone());
                Ok(())
            }
        }
    }
}

/// Writes each project into `<root>/<request_id>/<project_name>/`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Create store rooted at `root` (created on first write)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a request's snapshot is written to
    #[must_use]
    pub fn project_dir(&self, request_id: RequestId, snapshot: &ArtifactSnapshot) -> PathBuf {
        self.root
            .join(request_id.to_string())
            .join(snapshot.artifacts.project_name())
    }
}

#[async_trait]
impl ArtifactStore for DirectoryStore {
    async fn write(&self, request_id: RequestId, snapshot: &ArtifactSnapshot) -> Result<(), StoreError> {
        let dir = self.project_dir(request_id, snapshot);
        if let Some(request_dir) = dir.parent() {
            tokio::fs::create_dir_all(request_dir).await?;
        }
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyWritten(request_id));
            }
            Err(e) => return Err(e.into()),
        }

        for (name, contents) in snapshot.artifacts.iter() {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, contents).await?;
        }

        let metadata = serde_json::to_string_pretty(&snapshot.metadata)?;
        tokio::fs::write(dir.join(METADATA_FILE), metadata).await?;

        tracing::info!(
            request_id = %request_id,
            dir = %dir.display(),
            files = snapshot.artifacts.len(),
            "artifacts written"
        );
        Ok(())
    }
}
