//! Loads the static YAML config into typed structs. This is the only place
//! untrusted YAML is parsed; secrets (shop credentials) never live in the
//! file and are injected from the environment by the client constructor.

use anyhow::Result;
use feedsync_core::config::SyncConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    /// Shop identifier carried on progress events.
    pub shop: String,
    /// URL of the supplier XML feed.
    pub feed_url: String,
    /// Path of the JSON file backing the tracking store.
    #[serde(default = "default_tracking_path")]
    pub tracking_path: PathBuf,
    /// Pipeline tunables; every field is optional in the YAML.
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_tracking_path() -> PathBuf {
    PathBuf::from("feedsync-tracking.json")
}

/// Load and parse the YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    match serde_yaml::from_str::<CliConfig>(&config_content) {
        Ok(config) => {
            info!(config_path = ?path_ref, shop = %config.shop, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
