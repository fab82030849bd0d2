//! Configuration loader with multi-source merging.

use super::GovernanceConfig;
use crate::core::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `GOVERNOR_LEDGER__PATH`.
pub const ENV_PREFIX: &str = "GOVERNOR_";

/// Loads and validates [`GovernanceConfig`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. `GOVERNOR_*` environment variables
    /// 2. The TOML file at `path`, if given
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<GovernanceConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(GovernanceConfig::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        let config: GovernanceConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document over the defaults, without environment
    /// overrides.
    pub fn from_toml_str(toml: &str) -> Result<GovernanceConfig> {
        let config: GovernanceConfig = Figment::new()
            .merge(Serialized::defaults(GovernanceConfig::default()))
            .merge(Toml::string(toml))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load only default configuration.
    pub fn load_defaults() -> GovernanceConfig {
        GovernanceConfig::default()
    }
}
