use std::path::PathBuf;

use thiserror::Error;

mod schema;

pub use schema::{
    CURRENT_CONFIG_VERSION, Config, InstantiationConfig, MAX_REMINDER_DAYS_AHEAD,
    PlaceholderContact, ReminderConfig, RoleConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub async fn load_config_from_file(config_path: &PathBuf) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!("No config file found, creating one");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

/// Saves the config to the given path
pub async fn save_config_to_file(
    config: &Config,
    config_path: &PathBuf,
) -> Result<(), ConfigError> {
    let normalized = config.clone().normalized();
    normalized.validate()?;
    let raw_config = serde_json::to_string_pretty(&normalized)?;
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults_and_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = load_config_from_file(&path).await;
        assert_eq!(config.reminders.default_days_ahead, 3);

        let mut edited = config.clone();
        edited.instantiation.trace_milestone = Some("Design Meeting".to_string());
        save_config_to_file(&edited, &path).await.unwrap();

        let reloaded = load_config_from_file(&path).await;
        assert_eq!(
            reloaded.instantiation.trace_milestone.as_deref(),
            Some("Design Meeting")
        );
    }

    #[tokio::test]
    async fn save_rejects_negative_sealed_packet_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.instantiation.sealed_packet_offset_days = -2;
        let err = save_config_to_file(&config, &path).await.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(!path.exists());
    }
}
