use std::sync::Arc;
use sideload_core::{Config, InstallBridge, SanitizedConfig, TaskRegistry};

/// Shared application state
pub struct AppState {
    config: Config,
    registry: TaskRegistry,
    installer: Option<Arc<dyn InstallBridge>>,
}

impl AppState {
    pub fn new(config: Config, registry: TaskRegistry) -> Self {
        Self {
            config,
            registry,
            installer: None,
        }
    }

    /// Sets the bridge used by the install endpoint.
    pub fn with_installer(mut self, installer: Arc<dyn InstallBridge>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn installer(&self) -> Option<&dyn InstallBridge> {
        self.installer.as_deref()
    }
}
