use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{fs::operations::write_atomically, tracker::error::TrackerError};

use super::entities::ProjectCache;

/// Storage for the projects and tasks the user has worked on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectCacheStorage: Send + Sync {
    async fn load_project_cache(&self) -> Result<ProjectCache, TrackerError>;

    /// Overwrites the whole cache.
    async fn save_project_cache(&self, cache: &ProjectCache) -> Result<(), TrackerError>;
}

/// Keeps the cache as a single json file.
pub struct ProjectCacheFile {
    path: PathBuf,
}

impl ProjectCacheFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl ProjectCacheStorage for ProjectCacheFile {
    async fn load_project_cache(&self) -> Result<ProjectCache, TrackerError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No project cache at {:?}", self.path);
                return Ok(ProjectCache::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&content).map_err(|source| TrackerError::CacheFormat {
            path: self.path.clone(),
            source,
        })
    }

    async fn save_project_cache(&self, cache: &ProjectCache) -> Result<(), TrackerError> {
        let mut content =
            serde_json::to_vec_pretty(cache).map_err(|source| TrackerError::CacheFormat {
                path: self.path.clone(),
                source,
            })?;
        content.push(b'\n');
        write_atomically(&self.path, &content).await?;
        info!("Saved project cache into {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_missing_cache_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = ProjectCacheFile::new(dir.path().join("projects.json"));
        assert!(storage.load_project_cache().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_then_load() -> Result<()> {
        let dir = tempdir()?;
        let storage = ProjectCacheFile::new(dir.path().join("projects.json"));
        let mut cache = ProjectCache::default();
        cache.record("atlas", "review");
        cache.record("atlas", "deploy");
        cache.record("hog", "c2");

        storage.save_project_cache(&cache).await?;
        assert_eq!(storage.load_project_cache().await?, cache);

        cache.record("hog", "tauri");
        storage.save_project_cache(&cache).await?;
        let loaded = storage.load_project_cache().await?;
        assert_eq!(loaded.tasks("hog"), ["c2", "tauri"]);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_cache_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("projects.json");
        std::fs::write(&path, "{\"atlas\": 3}")?;
        let storage = ProjectCacheFile::new(path);

        let error = storage.load_project_cache().await.unwrap_err();
        assert!(matches!(error, TrackerError::CacheFormat { .. }), "{error}");
        Ok(())
    }
}
