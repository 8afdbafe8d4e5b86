use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::ConfigError;
use crate::domain::models::Config;

/// Project config file, merged over the defaults
pub const CONFIG_FILE: &str = "paramtrail.yaml";

/// Optional local overrides, merged over [`CONFIG_FILE`]
pub const LOCAL_CONFIG_FILE: &str = "paramtrail.local.yaml";

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "PARAMTRAIL_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `paramtrail.yaml` in the working directory
    /// 3. `paramtrail.local.yaml` (optional overrides)
    /// 4. Environment variables (`PARAMTRAIL_*`, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(Path::new(CONFIG_FILE))
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Defaults, then `path`, then environment overrides
    pub fn load_layered(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Self::figment(path)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load layered config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse a YAML document over the defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Render a configuration as YAML, suitable for [`CONFIG_FILE`]
    pub fn to_yaml(config: &Config) -> Result<String> {
        serde_yaml::to_string(config).context("Failed to serialize configuration")
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        config.validate()
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
    }
}
