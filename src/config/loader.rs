use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{default_config_path, BridgeConfig, ConfigError};

/// Builds a [`BridgeConfig`] from defaults, a TOML file and the environment,
/// later sources winning.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    explicit_path: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of the user-level one; it must exist.
    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    /// Ignore `GITBRIDGE_*` variables.
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub async fn load(&self) -> Result<BridgeConfig, ConfigError> {
        let mut config = match &self.explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.clone()));
                }
                Self::load_file(path).await?
            }
            None => match default_config_path() {
                Ok(path) if path.exists() => Self::load_file(&path).await?,
                Ok(path) => {
                    debug!("No configuration at {}, using defaults", path.display());
                    BridgeConfig::default()
                }
                Err(e) => {
                    debug!("{}, using defaults", e);
                    BridgeConfig::default()
                }
            },
        };

        if !self.skip_env {
            config.merge_env_vars()?;
        }
        config.validate()?;
        Ok(config)
    }

    async fn load_file(path: &Path) -> Result<BridgeConfig, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
