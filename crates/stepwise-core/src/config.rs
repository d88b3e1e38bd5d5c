//! Engine configuration.
//!
//! Settings live in `~/.config/stepwise/config.toml`. The engine reads the `[engine]`
//! table; other tables belong to the surrounding application and can be loaded with
//! [`load_config`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Tunables for the session controller.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds without a reply before a session is dropped. 0 disables the timeout.
    pub idle_timeout_secs: u64,
    /// Seconds between idle sweeps
    pub sweep_interval_secs: u64,
    /// Tell the participant when the breakout keyword ends a session
    pub notify_on_abort: bool,
    /// Tell the participant when an idle session is dropped
    pub notify_on_timeout: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            notify_on_abort: true,
            notify_on_timeout: true,
        }
    }
}

impl EngineConfig {
    /// Idle timeout, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Interval between idle sweeps, at least one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Loads the `[engine]` table from `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config::<ConfigRoot>(path).map(|root| root.engine)
    }

    /// Loads the `[engine]` table from the default config file.
    ///
    /// Returns defaults if the config directory cannot be determined or the file does
    /// not exist.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct ConfigRoot {
    #[serde(default)]
    engine: EngineConfig,
}

/// `~/.config/stepwise/config.toml`, if the config directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stepwise").join("config.toml"))
}

/// Deserializes `path` as `T`.
///
/// A missing or empty file yields `T::default()`; a file that exists but cannot be read
/// or parsed is an error.
pub fn load_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    Ok(toml::from_str(&content)?)
}
