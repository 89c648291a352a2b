use crate::config::types::Config;
use crate::utils::validation::is_empty_or_whitespace;
use anyhow::{Result, anyhow};
use log::{debug, error, trace, warn};
use std::path::{Path, PathBuf};

impl Config {
    /// Resolve the config path from a command line argument, falling back to the default location
    pub fn resolve_config_path(arg: Option<String>) -> String {
        #[allow(clippy::collapsible_if)]
        if let Some(s) = arg {
            if !is_empty_or_whitespace(&s) {
                return s;
            }
        }
        crate::config::types::DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load configuration from a file, writing defaults when it is missing or corrupted
    pub async fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());
        let config = if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            match serde_json::from_str::<Config>(&content) {
                Ok(mut cfg) => {
                    cfg.path = path.to_owned();
                    cfg
                }
                Err(e) => {
                    error!("Failed to parse config file: {}", e);
                    let backup_path = next_backup_path(path);
                    tokio::fs::rename(path, &backup_path).await?;
                    warn!("Config file corrupted, moved to {} and using default config", backup_path.display());
                    Self::save_default(path).await?;
                    Self::with_exact_path(path)
                }
            }
        } else {
            warn!("Config file not found, using default config");
            Self::save_default(path).await?;
            Self::with_exact_path(path)
        };
        trace!("Loaded config: {:#?}", config);
        Ok(config)
    }

    /// Save the current configuration to its file
    pub async fn save(&self) -> Result<()> {
        debug!("Saving config to: {}", self.path.display());
        #[allow(clippy::collapsible_if)]
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| anyhow!("Failed to create parent directory for config file: {}", e))?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Save a default configuration to the specified path
    pub async fn save_default(path: impl AsRef<Path>) -> Result<()> {
        debug!("Saving default config to: {}", path.as_ref().display());
        Self::with_exact_path(path).save().await
    }

    // Unlike `new`, keeps whatever extension the caller chose so load and save agree.
    fn with_exact_path(path: impl AsRef<Path>) -> Self {
        let mut config = Self::new(path.as_ref());
        config.path = path.as_ref().to_owned();
        config
    }
}

// First free `<stem>.corrupted.N` next to the config file.
fn next_backup_path(path: &Path) -> PathBuf {
    let mut number_of_corruptions = 1;
    let mut backup_path = path.with_extension(format!("corrupted.{}", number_of_corruptions));
    while backup_path.exists() {
        number_of_corruptions += 1;
        backup_path = path.with_extension(format!("corrupted.{}", number_of_corruptions));
    }
    backup_path
}
