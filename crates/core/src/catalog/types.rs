//! Types for catalog entries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::{compare_versions, CatalogEntryVersionInfo, UpdateStatus};

/// Marker used by the catalog when the latest version cannot be resolved.
pub const UNKNOWN_VERSION_MARKER: &str = "Unknown";

/// Marker used as a version label when the entry only links to its repository.
pub const REPOSITORY_VERSION_MARKER: &str = "View on GitHub";

/// File extensions that identify a directly downloadable installer.
const DIRECT_FILE_EXTENSIONS: &[&str] = &[".apk", ".exe", ".zip", ".dmg"];

/// Errors that can occur when resolving catalog data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown variant '{variant}' for item {item_id}")]
    UnknownVariant { item_id: String, variant: String },

    #[error("Item {0} has no download URL")]
    MissingUrl(String),
}

/// An alternate download for the same item (e.g. another architecture).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Display name, e.g. "arm64-v8a".
    pub name: String,
    /// Download URL for this build.
    pub url: String,
}

/// One installable item as published by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable identifier of the entry.
    pub item_id: String,
    /// Human readable name.
    pub name: String,
    /// Platform package identifier used by the installer (distinct from `item_id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    /// Canonical download URL.
    #[serde(default)]
    pub download_url: String,
    /// Named alternate builds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
    /// Latest version string as published upstream.
    pub latest_version: String,
    /// Version label shown by the catalog, when it differs from `latest_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
}

/// How an entry's download URL should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// URL points at an installer file.
    DirectFile,
    /// URL points at a source repository release.
    Repository,
    /// URL is a web page on a third-party site.
    ExternalSource,
    /// Not an http(s) URL.
    Invalid,
}

impl CatalogEntry {
    /// Whether the catalog could not resolve a real version for this entry.
    pub fn is_fallback(&self) -> bool {
        self.latest_version == UNKNOWN_VERSION_MARKER
            || self.version_label.as_deref() == Some(REPOSITORY_VERSION_MARKER)
    }

    /// Version information combined with the locally installed version.
    pub fn version_info(&self, installed_version: Option<String>) -> CatalogEntryVersionInfo {
        CatalogEntryVersionInfo {
            installed_version,
            latest_version: self.latest_version.clone(),
            is_fallback: self.is_fallback(),
        }
    }

    /// Update status against an installed version.
    pub fn update_status(&self, installed_version: Option<&str>) -> UpdateStatus {
        compare_versions(installed_version, &self.latest_version, self.is_fallback())
    }

    /// Latest version with a single leading `v` removed, for display.
    pub fn display_version(&self) -> &str {
        self.latest_version
            .strip_prefix('v')
            .unwrap_or(&self.latest_version)
    }

    /// Resolve the URL to download, optionally picking a named variant.
    pub fn resolve_url(&self, variant: Option<&str>) -> Result<&str, CatalogError> {
        let url = match variant {
            Some(name) => self
                .variants
                .iter()
                .find(|v| v.name == name)
                .map(|v| v.url.as_str())
                .ok_or_else(|| CatalogError::UnknownVariant {
                    item_id: self.item_id.clone(),
                    variant: name.to_string(),
                })?,
            None => self.download_url.as_str(),
        };

        if url.trim().is_empty() {
            return Err(CatalogError::MissingUrl(self.item_id.clone()));
        }
        Ok(url)
    }

    /// Classify the canonical download URL.
    pub fn source_kind(&self) -> SourceKind {
        classify_url(&self.download_url)
    }
}

/// Classify a download URL by its scheme, host and file extension.
pub fn classify_url(url: &str) -> SourceKind {
    let lower = url.trim().to_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return SourceKind::Invalid;
    }

    let path = lower
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if DIRECT_FILE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return SourceKind::DirectFile;
    }

    if lower.contains("github.com") {
        SourceKind::Repository
    } else {
        SourceKind::ExternalSource
    }
}
