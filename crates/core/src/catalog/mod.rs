//! Catalog model consumed by the download engine.
//!
//! The catalog itself is owned by an external service; this module only
//! describes the shape of its entries, how a download URL is resolved for an
//! entry, and how the installed-app collaborator is queried when building the
//! "available updates" view.

mod types;
mod updates;

pub use types::*;
pub use updates::{available_updates, InstalledApps, StaticInstalledApps};
