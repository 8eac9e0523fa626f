//! Simulator configuration.
//!
//! Provides [`SimConfig`], layered from built-in defaults, an optional config
//! file (TOML/JSON/YAML by extension) and `TRICKLE_`-prefixed environment
//! variables, in increasing order of precedence.

use std::path::Path;

use serde::{Deserialize, Serialize};
use trickle_core::constants::DEFAULT_CYCLE_BLOCKS;
use trickle_core::error::ConfigError;
use trickle_pool::PoolConfig;

/// Configuration for a simulator run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Blocks per cycle for the pool under simulation.
    pub cycle_blocks: u64,
    /// Log level filter string (e.g. "info", "debug", "trickle_pool=trace").
    pub log_level: String,
    /// Abort the run on the first rejected step instead of recording it.
    pub strict: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycle_blocks: DEFAULT_CYCLE_BLOCKS,
            log_level: "info".to_string(),
            strict: false,
        }
    }
}

impl SimConfig {
    /// Load defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = build(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.pool_config()?;
        Ok(cfg)
    }

    /// Validated pool configuration derived from this config.
    pub fn pool_config(&self) -> Result<PoolConfig, ConfigError> {
        PoolConfig::new(self.cycle_blocks)
    }
}

fn build(path: Option<&Path>) -> Result<SimConfig, config::ConfigError> {
    let defaults = SimConfig::default();
    let mut builder = config::Config::builder()
        .set_default("cycle_blocks", defaults.cycle_blocks)?
        .set_default("log_level", defaults.log_level)?
        .set_default("strict", defaults.strict)?;
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder
        .add_source(config::Environment::with_prefix("TRICKLE").try_parsing(true))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_cycle_blocks() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.cycle_blocks, DEFAULT_CYCLE_BLOCKS);
    }

    #[test]
    fn default_log_level_is_info() {
        assert_eq!(SimConfig::default().log_level, "info");
    }

    #[test]
    fn default_is_lenient() {
        assert!(!SimConfig::default().strict);
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "cycle_blocks = 25\nstrict = true").unwrap();
        let cfg = SimConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.cycle_blocks, 25);
        assert!(cfg.strict);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn load_rejects_zero_cycle() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "cycle_blocks = 0").unwrap();
        let max = trickle_core::constants::MAX_CYCLE_BLOCKS;
        assert_eq!(
            SimConfig::load(Some(file.path())),
            Err(ConfigError::InvalidCycleBlocks { got: 0, max })
        );
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn pool_config_carries_cycle_length() {
        let cfg = SimConfig {
            cycle_blocks: 7,
            ..SimConfig::default()
        };
        assert_eq!(cfg.pool_config().unwrap().cycle_blocks, 7);
    }
}
