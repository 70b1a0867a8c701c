//! Client configuration.
//!
//! Loaded in layers, lowest priority first:
//! 1. defaults (`ClientConfig::default`)
//! 2. a TOML file, `config/bizzorg.toml` or the path in `BIZZORG_CONFIG`
//! 3. environment variables `BIZZORG__<KEY>`, e.g. `BIZZORG__SITE_ROOT`

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;
use crate::resource::SiteConfig;

const DEFAULT_CONFIG_PATH: &str = "config/bizzorg.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid site root: {0}")]
    SiteRoot(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub site_root: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            site_root: "http://localhost:8000".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: concat!("bizzorg-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from the default file path and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BIZZORG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from `path` (optional, may be absent) and the environment.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();
        let config = Config::builder()
            .set_default("site_root", defaults.site_root)?
            .set_default("connect_timeout_secs", defaults.connect_timeout_secs)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .set_default("user_agent", defaults.user_agent)?
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("BIZZORG").prefix_separator("__").separator("__"))
            .build()?;
        let loaded: ClientConfig = config.try_deserialize()?;
        loaded.site()?;
        Ok(loaded)
    }

    /// The validated site and API roots.
    pub fn site(&self) -> Result<SiteConfig, ConfigError> {
        SiteConfig::new(&self.site_root).map_err(ConfigError::SiteRoot)
    }
}
