use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stepwise_core::config::{default_config_path, load_config};
use stepwise_core::{EngineConfig, Result};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "STEPWISE_CONFIG";

/// Settings for the simulated chat server, read from the `[console]` table.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Prefix marking a command, e.g. `!configure`
    pub command_prefix: String,
    /// Participant typing at startup
    pub participant: String,
    /// Channel at startup
    pub channel: String,
    /// Server every channel belongs to
    pub guild: String,
    /// Used when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_string(),
            participant: "alice".to_string(),
            channel: "general".to_string(),
            guild: "console".to_string(),
            log_filter: "stepwise_core=info,stepwise=info".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct ConsoleRoot {
    #[serde(default)]
    console: ConsoleConfig,
}

/// Location of the config file: `$STEPWISE_CONFIG`, else the platform default.
pub fn config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .or_else(default_config_path)
}

/// Loads both the engine and console tables. Missing files yield defaults.
pub fn load() -> Result<(EngineConfig, ConsoleConfig)> {
    match config_path() {
        Some(path) => {
            let engine = EngineConfig::load_from(&path)?;
            let console = load_config::<ConsoleRoot>(&path)?.console;
            Ok((engine, console))
        }
        None => Ok((EngineConfig::default(), ConsoleConfig::default())),
    }
}
