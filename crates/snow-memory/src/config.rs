//! Configuration for long-term memory.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Dimensionality of `text-embedding-3-small`.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Long-term memory configuration (the `[memory]` table).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MemoryConfig {
    /// Fixed embedding dimensionality. Every stored and query vector must match.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// How many memories to recall per cycle.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_top_k() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            top_k: default_top_k(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip() {
        let config = MemoryConfig {
            dimension: 384,
            top_k: 8,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let recovered: MemoryConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(recovered, config);
    }

    #[test]
    fn deserialize_empty_config_uses_defaults() {
        let config: MemoryConfig = toml::from_str("").unwrap();
        assert_eq!(config, MemoryConfig::default());
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn deserialize_partial_config() {
        let config: MemoryConfig = toml::from_str("top_k = 3").unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.dimension, DEFAULT_DIMENSION);
    }
}
