//! Deploy-time pool configuration.
//!
//! The cycle length is the only tunable. Longer cycles make collection
//! cheaper but delay funds by up to one cycle; shorter cycles do the opposite.

use serde::{Deserialize, Serialize};
use trickle_core::constants::{DEFAULT_CYCLE_BLOCKS, MAX_CYCLE_BLOCKS};
use trickle_core::error::ConfigError;

/// Configuration fixed for the lifetime of a pool.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Blocks per cycle.
    pub cycle_blocks: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cycle_blocks: DEFAULT_CYCLE_BLOCKS,
        }
    }
}

impl PoolConfig {
    /// Validated configuration with the given cycle length.
    pub fn new(cycle_blocks: u64) -> Result<Self, ConfigError> {
        let cfg = Self { cycle_blocks };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_blocks == 0 || self.cycle_blocks > MAX_CYCLE_BLOCKS {
            return Err(ConfigError::InvalidCycleBlocks {
                got: self.cycle_blocks,
                max: MAX_CYCLE_BLOCKS,
            });
        }
        Ok(())
    }
}
