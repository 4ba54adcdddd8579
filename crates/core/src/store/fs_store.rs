//! File system artifact store.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tracing::{debug, warn};

use super::error::StoreError;
use super::types::{ArtifactPaths, ReadyArtifact};

/// Suffix of temporary download files.
const PARTIAL_SUFFIX: &str = ".part";

/// Extension used when the URL does not carry a usable one.
const DEFAULT_EXTENSION: &str = "bin";

/// Hex digits of the content discriminator kept in file names.
const DISCRIMINATOR_LEN: usize = 12;

/// Hex digits of the task id kept in temporary file names.
const ATTEMPT_LEN: usize = 8;

/// Manages temporary and ready artifacts inside one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The artifact directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the artifact directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::DirectoryCreationFailed {
                path: self.root.clone(),
                source: e,
            })
    }

    /// Allocates the temporary and final paths for one download attempt.
    ///
    /// The final path depends only on the item id and the URL; the temporary
    /// path additionally carries the task id.
    pub fn allocate(&self, item_id: &str, url: &str, task_id: &str) -> ArtifactPaths {
        let stem = format!("{}-{}", item_key(item_id), discriminator(item_id, url));
        let extension = url_extension(url);
        let attempt: String = task_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(ATTEMPT_LEN)
            .collect();

        ArtifactPaths {
            temp_path: self
                .root
                .join(format!(".{}.{}{}", stem, attempt, PARTIAL_SUFFIX)),
            final_path: self.root.join(format!("{}.{}", stem, extension)),
        }
    }

    /// Creates (or truncates) the temporary file for writing.
    pub async fn create_temp(&self, paths: &ArtifactPaths) -> Result<File, StoreError> {
        self.ensure_root().await?;
        File::create(&paths.temp_path)
            .await
            .map_err(|e| StoreError::write_failed(&paths.temp_path, e))
    }

    /// Atomically moves a complete temporary file to its final path.
    ///
    /// Both paths live in the same directory, so this is a single rename and
    /// never a copy. An existing file at the final path is replaced.
    pub async fn promote(&self, temp_path: &Path, final_path: &Path) -> Result<(), StoreError> {
        fs::rename(temp_path, final_path)
            .await
            .map_err(|e| StoreError::promote_failed(temp_path, final_path, e))?;
        debug!(
            "Promoted {} to {}",
            temp_path.display(),
            final_path.display()
        );
        Ok(())
    }

    /// Deletes a file.
    ///
    /// Returns `false` when there was nothing to delete; that is not an error.
    pub async fn delete(&self, path: &Path) -> Result<bool, StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(StoreError::PermissionDenied {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => Err(StoreError::DeleteFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Best-effort removal of a temporary file; failures are only logged.
    pub async fn discard(&self, temp_path: &Path) {
        if let Err(e) = self.delete(temp_path).await {
            warn!("Failed to discard partial file {}: {}", temp_path.display(), e);
        }
    }

    /// Size of a file in bytes.
    pub async fn file_size(&self, path: &Path) -> Result<u64, StoreError> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Deletes every leftover temporary file. Returns how many were removed.
    ///
    /// In-flight downloads do not survive a restart, so anything still named
    /// `*.part` at startup is garbage.
    pub async fn sweep_partials(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for path in self.list_files().await? {
            if is_partial(&path) && self.delete(&path).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Swept {} partial files from {}", removed, self.root.display());
        }
        Ok(removed)
    }

    /// Lists promoted artifacts so they can be reconciled with the catalog.
    ///
    /// Files that do not follow the artifact naming scheme are ignored.
    pub async fn scan_ready(&self) -> Result<Vec<ReadyArtifact>, StoreError> {
        let mut artifacts = Vec::new();
        for path in self.list_files().await? {
            if is_partial(&path) {
                continue;
            }
            let Some(item_key) = parse_item_key(&path) else {
                continue;
            };
            let size_bytes = self.file_size(&path).await?;
            artifacts.push(ReadyArtifact {
                item_key,
                path,
                size_bytes,
            });
        }
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(artifacts)
    }

    async fn list_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

/// Reduces an item id to characters that are safe in a file name.
pub fn item_key(item_id: &str) -> String {
    let key: String = item_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        "item".to_string()
    } else {
        key
    }
}

fn discriminator(item_id: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..DISCRIMINATOR_LEN].to_string()
}

fn url_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file_name = path.rsplit('/').next().unwrap_or_default();
    match file_name.rsplit_once('.') {
        Some((name, ext))
            if !name.is_empty()
                && !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX))
}

fn parse_item_key(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (key, disc) = stem.rsplit_once('-')?;
    if key.is_empty()
        || disc.len() != DISCRIMINATOR_LEN
        || !disc.chars().all(|c| c.is_ascii_hexdigit())
    {
        return None;
    }
    Some(key.to_string())
}
