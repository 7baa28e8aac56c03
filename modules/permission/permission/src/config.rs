use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Deserializer};
use tx_context::TxConfig;

use crate::domain::resolver::TraversalLimits;

/// Environment variable prefix; nested keys use `__`, e.g. `PERMISSION__DATABASE__URL`.
pub const ENV_PREFIX: &str = "PERMISSION__";

/// Permission module configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionConfig {
    /// Wall-clock budget of one transaction, humantime format (`"30s"`, `"5m"`).
    #[serde(deserialize_with = "deserialize_duration")]
    pub transaction_timeout: Duration,

    /// How many membership hops are followed when collecting an identity's groups.
    pub max_membership_depth: usize,

    /// How many ancestors are walked above the target resource.
    pub max_hierarchy_depth: usize,

    /// `SeaORM` storage. Without it the module keeps its data in memory.
    pub database: Option<DatabaseConfig>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        let limits = TraversalLimits::default();
        Self {
            transaction_timeout: TxConfig::default().timeout,
            max_membership_depth: limits.max_membership_depth,
            max_hierarchy_depth: limits.max_hierarchy_depth,
            database: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

impl PermissionConfig {
    /// Loads configuration from an optional YAML file, overridden by
    /// `PERMISSION__*` environment variables. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or holds unknown keys.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    #[must_use]
    pub fn tx_config(&self) -> TxConfig {
        TxConfig::with_timeout(self.transaction_timeout)
    }

    #[must_use]
    pub fn traversal_limits(&self) -> TraversalLimits {
        TraversalLimits {
            max_membership_depth: self.max_membership_depth,
            max_hierarchy_depth: self.max_hierarchy_depth,
        }
    }
}
