//! # Storage Configuration
//!
//! Sizing knobs for a [`StorageManager`](crate::ecs::StorageManager),
//! loadable from TOML:
//!
//! ```toml
//! chunk_capacity = 2048
//! archetype_capacity = 64
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};
use crate::memory::DEFAULT_CHUNK_CAPACITY;

/// Storage sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Slots per pool chunk. Must be in `1..=u32::MAX`.
    pub chunk_capacity: usize,
    /// Rows reserved by every new archetype.
    pub archetype_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            archetype_capacity: 0,
        }
    }
}

impl StorageConfig {
    /// Parses and validates a TOML document. Missing keys take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidConfig`] if the document does not parse or a
    /// value is out of range.
    pub fn from_toml_str(source: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> StorageResult<()> {
        if self.chunk_capacity == 0 {
            return Err(StorageError::InvalidConfig(
                "chunk_capacity must be at least 1".into(),
            ));
        }
        if u32::try_from(self.chunk_capacity).is_err() {
            return Err(StorageError::InvalidConfig(format!(
                "chunk_capacity {} exceeds the 32-bit slot address space",
                self.chunk_capacity
            )));
        }
        Ok(())
    }
}
