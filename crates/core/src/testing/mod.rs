//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the engine's external
//! seams, allowing end-to-end tests of the registry without a network or a
//! platform installer.
//!
//! # Example
//!
//! ```rust,ignore
//! use sideload_core::testing::{MockFetcher, MockResponse, RecordingNotifier};
//!
//! let fetcher = MockFetcher::new();
//! fetcher.set_response("https://x.test/app.apk", MockResponse::sized(1024)).await;
//!
//! // Use in a TaskRegistry...
//! ```

mod mock_fetcher;
mod mock_installer;
mod recording_notifier;

pub use mock_fetcher::{MockFetcher, MockResponse, RecordedFetch};
pub use mock_installer::{MockInstaller, RecordedInstall};
pub use recording_notifier::RecordingNotifier;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::{CatalogEntry, Variant};

    /// Create a catalog entry with a direct download URL.
    pub fn catalog_entry(item_id: &str, latest_version: &str) -> CatalogEntry {
        CatalogEntry {
            item_id: item_id.to_string(),
            name: item_id
                .split('-')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" "),
            package_name: Some(format!("com.example.{}", item_id.replace('-', "_"))),
            download_url: download_url(item_id, latest_version),
            variants: vec![],
            latest_version: latest_version.to_string(),
            version_label: None,
        }
    }

    /// Create a catalog entry with per-architecture variants.
    pub fn catalog_entry_with_variants(item_id: &str, latest_version: &str) -> CatalogEntry {
        let mut entry = catalog_entry(item_id, latest_version);
        entry.variants = ["arm64-v8a", "armeabi-v7a"]
            .iter()
            .map(|abi| Variant {
                name: abi.to_string(),
                url: format!(
                    "https://downloads.example.com/{}/{}-{}-{}.apk",
                    item_id, item_id, latest_version, abi
                ),
            })
            .collect();
        entry
    }

    /// Create a catalog entry whose latest version is unknown upstream.
    pub fn fallback_entry(item_id: &str) -> CatalogEntry {
        let mut entry = catalog_entry(item_id, crate::catalog::UNKNOWN_VERSION_MARKER);
        entry.download_url = format!("https://github.com/example/{}", item_id);
        entry
    }

    /// Canonical download URL used by the fixtures.
    pub fn download_url(item_id: &str, version: &str) -> String {
        format!(
            "https://downloads.example.com/{}/{}-{}.apk",
            item_id, item_id, version
        )
    }
}
