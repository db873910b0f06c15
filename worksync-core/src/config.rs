//! `~/.worksync/config.yaml`: client configuration.
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Credentials are never stored here; see [`Config::token`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

/// Environment variable holding the bearer token for the remote services.
pub const TOKEN_ENV: &str = "WORKSYNC_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the context and generation services.
    pub server_url: String,
    /// Trailing-edge quiet period before a context flush.
    pub debounce_ms: u64,
    /// How often a dirty, idle synchronizer retries a failed flush.
    pub retry_interval_secs: u64,
    pub context_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    /// Directory entry names skipped by the tree scanner and the watcher.
    pub ignore: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            debounce_ms: 750,
            retry_interval_secs: 30,
            context_timeout_secs: 30,
            generation_timeout_secs: 120,
            ignore: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn context_timeout(&self) -> Duration {
        Duration::from_secs(self.context_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Bearer token from [`TOKEN_ENV`], if set and non-empty.
    pub fn token() -> Option<String> {
        std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty())
    }
}

/// `<home>/.worksync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".worksync").join("config.yaml")
}

/// Load the config, falling back to defaults when the file does not exist.
///
/// Returns [`CoreError::Config`] (with path + line context) if malformed.
pub fn load_at(home: &Path) -> Result<Config, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| CoreError::Config { path, source })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, CoreError> {
    load_at(&home()?)
}

/// Atomically save the config: `.yaml.tmp` sibling, then rename.
pub fn save_at(home: &Path, config: &Config) -> Result<(), CoreError> {
    let path = config_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid config path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}
