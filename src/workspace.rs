use log::debug;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::task;

use crate::cache_key::CacheKey;
use crate::error::{Error, Result};

const SOURCE_FILE: &str = "source.txt";
const MASTER_MANIFEST_FILE: &str = "master.m3u8";
const MEDIA_PLAYLIST_FILE: &str = "v0.m3u8";
const RENDITION_DIR: &str = "v0";

/// Filesystem-backed store of workspaces, one directory per cache key:
///
/// ```text
/// <base_dir>/<key>/source.txt
/// <base_dir>/<key>/master.m3u8
/// <base_dir>/<key>/v0.m3u8
/// <base_dir>/<key>/v0/<index>.ts
/// ```
///
/// Every file is written to a temporary sibling and renamed into place, so
/// an existence check never observes partial content. The source record is
/// the publish marker of a workspace and is written last.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    base_dir: PathBuf,
}

impl WorkspaceStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> WorkspaceStore {
        WorkspaceStore {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn workspace_dir(&self, key: &CacheKey) -> PathBuf {
        self.base_dir.join(key.as_str())
    }

    pub fn source_path(&self, key: &CacheKey) -> PathBuf {
        self.workspace_dir(key).join(SOURCE_FILE)
    }

    pub fn master_manifest_path(&self, key: &CacheKey) -> PathBuf {
        self.workspace_dir(key).join(MASTER_MANIFEST_FILE)
    }

    pub fn media_playlist_path(&self, key: &CacheKey) -> PathBuf {
        self.workspace_dir(key).join(MEDIA_PLAYLIST_FILE)
    }

    pub fn segment_path(&self, key: &CacheKey, index: u64) -> PathBuf {
        self.workspace_dir(key)
            .join(RENDITION_DIR)
            .join(format!("{}.ts", index))
    }

    /// True iff the workspace has been published.
    pub async fn exists(&self, key: &CacheKey) -> Result<bool> {
        path_exists(&self.source_path(key)).await
    }

    pub async fn segment_exists(&self, key: &CacheKey, index: u64) -> Result<bool> {
        path_exists(&self.segment_path(key, index)).await
    }

    /// Creates the workspace directory tree without publishing it.
    pub async fn prepare(&self, key: &CacheKey) -> Result<()> {
        let dir = self.workspace_dir(key).join(RENDITION_DIR);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::storage(dir, e))
    }

    pub async fn write_master_manifest(&self, key: &CacheKey, contents: String) -> Result<()> {
        write_atomic(self.master_manifest_path(key), contents.into_bytes()).await
    }

    pub async fn write_media_playlist(&self, key: &CacheKey, contents: String) -> Result<()> {
        write_atomic(self.media_playlist_path(key), contents.into_bytes()).await
    }

    /// Publishes the workspace by writing its source record. Calling it for an
    /// already published key leaves the existing record untouched.
    pub async fn create(&self, key: &CacheKey, locator: &str) -> Result<()> {
        if self.exists(key).await? {
            return Ok(());
        }

        self.prepare(key).await?;
        write_atomic(self.source_path(key), locator.as_bytes().to_vec()).await?;

        debug!("Published workspace {} for src={}", key, locator);
        Ok(())
    }

    pub async fn read_source(&self, key: &CacheKey) -> Result<String> {
        let path = self.source_path(key);

        match tokio::fs::read_to_string(&path).await {
            Ok(locator) => Ok(locator),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("No workspace for key {}", key)))
            }
            Err(e) => Err(Error::storage(path, e)),
        }
    }

    /// Reserves a uniquely named scratch file next to the final segment path.
    /// The file is removed when the returned handle is dropped unless it is
    /// persisted.
    pub async fn segment_scratch_path(&self, key: &CacheKey, index: u64) -> Result<TempPath> {
        let dir = self.workspace_dir(key).join(RENDITION_DIR);

        blocking(dir.clone(), move || {
            tempfile::Builder::new()
                .prefix(&format!(".{}.", index))
                .suffix(".ts.part")
                .tempfile_in(&dir)
                .map(|file| file.into_temp_path())
        })
        .await
    }
}

async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::storage(path, e))
}

/// Writes `contents` to a temporary file in the target directory and renames
/// it over `path`.
pub(crate) async fn write_atomic(path: PathBuf, contents: Vec<u8>) -> Result<()> {
    let target = path.clone();

    blocking(path, move || {
        let dir = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".part")
            .tempfile_in(dir)?;
        tmp.write_all(&contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;

        Ok(())
    })
    .await
}

async fn blocking<T, F>(path: PathBuf, f: F) -> Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(result) => result.map_err(|e| Error::storage(path, e)),
        Err(e) => Err(Error::Internal(format!(
            "storage task for `{}` failed: {}",
            path.display(),
            e
        ))),
    }
}
