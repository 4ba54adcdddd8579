//! Artifact store: on-disk placement of downloaded files.
//!
//! Every download writes to a temporary `.part` file next to its final
//! artifact path. A completed download is promoted with a rename, so a file
//! at the final path is always complete. Deleting an artifact is idempotent.
//!
//! # File naming
//!
//! Final artifacts are named `{key}-{discriminator}.{ext}` where `key` is the
//! item id reduced to filesystem-safe characters and `discriminator` is the
//! first 12 hex digits of `sha256(item_id \n url)`. Temporary files are
//! hidden (`.` prefix) and carry the task id, so an old ready file, a fresh
//! download of a new version and a cancelled attempt still winding down never
//! share a path.

mod config;
mod error;
mod fs_store;
mod types;

pub use config::StorageConfig;
pub use error::StoreError;
pub use fs_store::ArtifactStore;
pub use types::{ArtifactPaths, ReadyArtifact};
