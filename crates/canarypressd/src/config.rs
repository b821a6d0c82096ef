//! canarypress.toml configuration parser and flag merging.
//!
//! Every setting can come from the config file or a CLI flag; flags win.
//! The four identity settings (API key, zone, release group, device) are
//! required in `run` mode and missing ones abort startup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.turbinelabs.io";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Raw contents of canarypress.toml. Everything optional; resolution decides
/// what is actually required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub zone: Option<String>,
    pub release_group: Option<String>,
    pub device: Option<String>,
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// CLI flag values layered on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub zone: Option<String>,
    pub release_group: Option<String>,
    pub device: Option<String>,
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub zone: String,
    pub release_group: String,
    pub device: String,
    pub base_url: String,
    pub poll_interval: Duration,
}

impl Settings {
    /// Merge flags over the file and check the required settings.
    pub fn resolve(file: FileConfig, flags: Overrides) -> anyhow::Result<Self> {
        let required = |flag: Option<String>, from_file: Option<String>, name: &str| {
            flags_over_file(flag, from_file).ok_or_else(|| {
                anyhow::anyhow!("missing required setting `{name}` (flag --{name} or canarypress.toml)")
            })
        };
        Ok(Settings {
            api_key: required(flags.api_key, file.api_key, "api-key")?,
            zone: required(flags.zone, file.zone, "zone")?,
            release_group: required(flags.release_group, file.release_group, "release-group")?,
            device: required(flags.device, file.device, "device")?,
            base_url: flags_over_file(flags.base_url, file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            poll_interval: Duration::from_millis(
                flags
                    .poll_interval_ms
                    .or(file.poll_interval_ms)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        })
    }
}

fn flags_over_file(flag: Option<String>, file: Option<String>) -> Option<String> {
    flag.or(file)
}
