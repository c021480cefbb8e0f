use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub mod loader;

pub use loader::ConfigLoader;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

/// Location of the user-level configuration file
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("", "", "gitbridge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Executable spawned for every command
    pub git_program: String,
    /// Initial working directory of the executor
    pub working_dir: Option<PathBuf>,
    /// Extra environment for spawned commands
    pub env: HashMap<String, String>,
    /// Give up waiting for the command lock after this many milliseconds
    pub lock_timeout_ms: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
            working_dir: None,
            env: HashMap::new(),
            lock_timeout_ms: None,
        }
    }
}

impl BridgeConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Apply `GITBRIDGE_*` overrides from the process environment.
    pub fn merge_env_vars(&mut self) -> Result<(), ConfigError> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup("GITBRIDGE_GIT") {
            self.git_program = program;
        }

        if let Some(dir) = lookup("GITBRIDGE_WORKDIR") {
            self.working_dir = Some(PathBuf::from(dir));
        }

        if let Some(timeout) = lookup("GITBRIDGE_LOCK_TIMEOUT_MS") {
            let millis = timeout
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "GITBRIDGE_LOCK_TIMEOUT_MS".to_string(),
                    value: timeout.clone(),
                })?;
            self.lock_timeout_ms = Some(millis);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git_program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "git_program".to_string(),
                value: self.git_program.clone(),
            });
        }
        Ok(())
    }
}
