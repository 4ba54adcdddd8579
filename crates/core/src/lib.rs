pub mod catalog;
pub mod config;
pub mod install;
pub mod metrics;
pub mod notify;
pub mod registry;
pub mod store;
pub mod testing;
pub mod version;
pub mod worker;

pub use catalog::{
    available_updates, CatalogEntry, CatalogError, InstalledApps, SourceKind, StaticInstalledApps,
    Variant,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use install::{CommandInstaller, InstallBridge, InstallError, InstallerConfig};
pub use notify::{LogNotifier, NotificationBridge, NotificationPayload};
pub use registry::{
    DownloadConfig, DownloadRequest, FailureKind, QueueSummary, RegistryError, Started, Task,
    TaskError, TaskEvent, TaskRegistry, TaskState,
};
pub use store::{ArtifactStore, StorageConfig, StoreError};
pub use version::{compare_versions, CatalogEntryVersionInfo, UpdateStatus};
pub use worker::{DownloadError, Fetcher, HttpFetcher};
