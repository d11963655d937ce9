use std::{env, fs, num::NonZeroUsize, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable holding the config path when none is given on the command line.
pub const CONFIG_ENV: &str = "NODE_CONFIG";

/// Parameters of a simulated federated evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default = "defaults::clients")]
    pub clients: NonZeroUsize,
    #[serde(default = "defaults::feature_dim")]
    pub feature_dim: NonZeroUsize,
    #[serde(default = "defaults::examples_per_client")]
    pub examples_per_client: NonZeroUsize,
    #[serde(default = "defaults::batch_size")]
    pub batch_size: NonZeroUsize,
    /// Seeds the weights and every client's data, random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

mod defaults {
    use std::num::NonZeroUsize;

    const CLIENTS: NonZeroUsize = NonZeroUsize::new(4).unwrap();
    const FEATURE_DIM: NonZeroUsize = NonZeroUsize::new(3).unwrap();
    const EXAMPLES_PER_CLIENT: NonZeroUsize = NonZeroUsize::new(64).unwrap();
    const BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(16).unwrap();

    pub fn clients() -> NonZeroUsize {
        CLIENTS
    }

    pub fn feature_dim() -> NonZeroUsize {
        FEATURE_DIM
    }

    pub fn examples_per_client() -> NonZeroUsize {
        EXAMPLES_PER_CLIENT
    }

    pub fn batch_size() -> NonZeroUsize {
        BATCH_SIZE
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            clients: defaults::clients(),
            feature_dim: defaults::feature_dim(),
            examples_per_client: defaults::examples_per_client(),
            batch_size: defaults::batch_size(),
            seed: None,
        }
    }
}

impl NodeConfig {
    /// Parses a config from JSON, missing fields take their defaults.
    ///
    /// # Errors
    /// Fails on malformed JSON, unknown fields or zero counts.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid node config")
    }

    /// Reads a config from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?;

        Self::from_json(&content)
    }

    /// Loads the config from `arg`, falling back to `NODE_CONFIG` and then to the defaults.
    pub fn load(arg: Option<String>) -> Result<Self> {
        match arg.or_else(|| env::var(CONFIG_ENV).ok()) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = NodeConfig::from_json(r#"{ "clients": 2, "seed": 7 }"#).unwrap();
        assert_eq!(config.clients.get(), 2);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.batch_size, NodeConfig::default().batch_size);
    }

    #[test]
    fn zero_counts_are_rejected() {
        assert!(NodeConfig::from_json(r#"{ "batch_size": 0 }"#).is_err());
        assert!(NodeConfig::from_json(r#"{ "unknown": 1 }"#).is_err());
    }
}
