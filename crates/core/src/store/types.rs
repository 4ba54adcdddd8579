//! Types for the artifact store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths allocated for one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Where bytes are written while the download runs.
    pub temp_path: PathBuf,
    /// Where the complete artifact lives after promotion.
    pub final_path: PathBuf,
}

/// A promoted artifact found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyArtifact {
    /// Filesystem-safe key derived from the item id.
    pub item_key: String,
    /// Path of the artifact.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
}
