//! Update availability for catalog items.
//!
//! Upstream version strings are free-form ("1.4.2", "v20240101", "nightly"),
//! so no semantic version parsing is attempted: an installed version equal to
//! the latest one is up to date, anything else is an update.

use serde::{Deserialize, Serialize};

/// Result of comparing an installed version against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Installed, and the catalog offers a different version.
    UpdateAvailable,
    /// Installed version matches the latest one.
    UpToDate,
    /// Nothing installed for this item.
    NotInstalled,
    /// The catalog could not resolve a real version; update actions are disabled.
    Indeterminate,
}

impl UpdateStatus {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::UpdateAvailable => "update_available",
            UpdateStatus::UpToDate => "up_to_date",
            UpdateStatus::NotInstalled => "not_installed",
            UpdateStatus::Indeterminate => "indeterminate",
        }
    }

    /// Whether a caller may offer an install/update action.
    pub fn allows_download(&self) -> bool {
        matches!(
            self,
            UpdateStatus::UpdateAvailable | UpdateStatus::NotInstalled
        )
    }
}

/// Version information for one catalog entry, as seen by the comparator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntryVersionInfo {
    /// Installed version, absent when the item is not installed.
    #[serde(default)]
    pub installed_version: Option<String>,
    /// Latest version advertised by the catalog.
    pub latest_version: String,
    /// True when the catalog could not resolve a real version.
    #[serde(default)]
    pub is_fallback: bool,
}

impl CatalogEntryVersionInfo {
    /// Compare this entry's versions.
    pub fn status(&self) -> UpdateStatus {
        compare_versions(
            self.installed_version.as_deref(),
            &self.latest_version,
            self.is_fallback,
        )
    }
}

/// Decide whether an update is available.
///
/// A fallback entry is always [`UpdateStatus::Indeterminate`], whatever the
/// strings say.
pub fn compare_versions(installed: Option<&str>, latest: &str, is_fallback: bool) -> UpdateStatus {
    if is_fallback {
        return UpdateStatus::Indeterminate;
    }

    match installed {
        None => UpdateStatus::NotInstalled,
        Some(installed) if installed == latest => UpdateStatus::UpToDate,
        Some(_) => UpdateStatus::UpdateAvailable,
    }
}
