use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Artifact directory is set
/// - Progress throttling and update channel settings are usable
/// - A configured installer names a program
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.storage.artifact_dir.as_os_str().is_empty() {
        return Err(invalid("storage.artifact_dir cannot be empty"));
    }

    let downloads = &config.downloads;
    if downloads.progress_interval_ms == 0 {
        return Err(invalid("downloads.progress_interval_ms cannot be 0"));
    }
    if !(0.0..=100.0).contains(&downloads.progress_min_percent_delta) {
        return Err(invalid(
            "downloads.progress_min_percent_delta must be between 0 and 100",
        ));
    }
    if downloads.update_channel_capacity == 0 {
        return Err(invalid("downloads.update_channel_capacity cannot be 0"));
    }
    if downloads.chunk_size == 0 {
        return Err(invalid("downloads.chunk_size cannot be 0"));
    }

    if let Some(installer) = &config.installer {
        if installer.program.trim().is_empty() {
            return Err(invalid("installer.program cannot be empty"));
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::InstallerConfig;
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_artifact_dir_fails() {
        let mut config = Config::default();
        config.storage.artifact_dir = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_download_settings() {
        let mut config = Config::default();
        config.downloads.progress_interval_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.downloads.progress_min_percent_delta = 150.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.downloads.progress_min_percent_delta = -1.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.downloads.update_channel_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_installer_program() {
        let mut config = Config::default();
        config.installer = Some(InstallerConfig::new("  "));
        assert!(validate_config(&config).is_err());

        config.installer = Some(InstallerConfig::new("adb"));
        assert!(validate_config(&config).is_ok());
    }
}
