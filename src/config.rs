//! Datasource configuration.
//!
//! Settings come from an optional TOML file, then `PRTG_*` environment
//! variables, then command-line overrides applied by the binary:
//!
//! ```toml
//! hostname = "prtg.example.com"
//! username = "prtgadmin"
//! passhash = "1234567890"
//! cache_timeout_secs = 300
//! tz_auto_adjust = false
//! request_timeout_ms = 30000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use prtgwatch_client::ApiClient;

/// Prefix for environment overrides (`PRTG_HOSTNAME`, `PRTG_PASSHASH`, ...).
pub const ENV_PREFIX: &str = "PRTG";

/// Connection settings for one PRTG server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub passhash: String,
    #[serde(default = "default_cache_timeout_secs")]
    pub cache_timeout_secs: u64,
    #[serde(default)]
    pub tz_auto_adjust: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

const fn default_cache_timeout_secs() -> u64 {
    300
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            username: String::new(),
            passhash: String::new(),
            cache_timeout_secs: default_cache_timeout_secs(),
            tz_auto_adjust: false,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl PluginConfig {
    /// Load from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Build an API client for these settings.
    pub fn build_client(&self) -> Result<ApiClient> {
        if self.hostname.trim().is_empty() {
            bail!("no hostname configured (set `hostname` or {ENV_PREFIX}_HOSTNAME)");
        }

        ApiClient::builder()
            .hostname(self.hostname.trim())
            .credentials(&self.username, &self.passhash)
            .cache_timeout_secs(self.cache_timeout_secs)
            .request_timeout(self.request_timeout())
            .tz_auto_adjust(self.tz_auto_adjust)
            .build()
            .context("failed to build API client")
    }
}
